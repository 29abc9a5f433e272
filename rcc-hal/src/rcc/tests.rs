use super::*;
use crate::family::f1::{self, regs as f1r, F1Osc, F1Pll};
use crate::family::f1cl::{self, ClOsc, ClPll};
use crate::family::l1::{self, regs as l1r, L1Osc, L1Pll, L1Scale};
use crate::family::{Encoding, F1Cl, F1, L1};
use crate::sim::{SimBus, SimDeadline};
use crate::time::Hertz;

fn f1_rcc(state: &FrequencyState) -> Rcc<'_, F1, SimBus<F1>> {
    Rcc::new(SimBus::new(), state, Board::new())
}

fn l1_rcc(state: &FrequencyState) -> Rcc<'_, L1, SimBus<L1>> {
    Rcc::new(SimBus::new(), state, Board::new())
}

fn hse8() -> Board {
    Board::new().with_hse(ExternalClock::crystal(Hertz::mhz(8)))
}

#[test]
fn divider_encodings() {
    let mul = Encoding::Linear { min: 2, max: 16, offset: 2 };
    assert_eq!(mul.encode(9), Some(7));
    assert_eq!(mul.encode(1), None);
    assert_eq!(mul.encode(17), None);
    assert_eq!(mul.decode(7), Some(9));
    assert_eq!(mul.decode(15), None);

    let div = Encoding::Table(&[(2, 1), (3, 2), (4, 3)]);
    assert_eq!(div.encode(3), Some(2));
    assert_eq!(div.encode(5), None);
    assert_eq!(div.decode(0), None);

    assert_eq!(AhbPrescaler::Div512.to_bits(), 0b1111);
    assert_eq!(AhbPrescaler::from_bits(0b0011), AhbPrescaler::Div1);
    assert_eq!(AhbPrescaler::from_divisor(64), Some(AhbPrescaler::Div64));
    assert_eq!(AhbPrescaler::from_divisor(32), None);
    assert_eq!(ApbPrescaler::Div2.to_bits(), 0b100);
    assert_eq!(ApbPrescaler::from_bits(0b111), ApbPrescaler::Div16);
}

#[test]
fn prescaler_bracket_takes_the_slower_side() {
    let a = Prescalers::new().with_apb1(ApbPrescaler::Div2);
    let b = Prescalers::new().with_ahb(AhbPrescaler::Div4);
    let br = a.bracket(b);
    assert_eq!(br.ahb, AhbPrescaler::Div4);
    assert_eq!(br.apb1, ApbPrescaler::Div2);
    assert_eq!(br.apb2, ApbPrescaler::Div1);
}

#[test]
fn poll_limit_restarts_per_wait() {
    let mut t = PollLimit::new(3);
    t.start();
    assert!(!t.expired());
    assert!(!t.expired());
    assert!(!t.expired());
    assert!(t.expired());
    t.start();
    assert!(!t.expired());
}

#[test]
fn out_of_range_multiplier_is_rejected_without_writes() {
    let state = FrequencyState::new(F1::RESET_CLOCKS);
    let mut rcc = f1_rcc(&state);
    let cfg = PllConfig::new(PllInput::Osc(F1Osc::Hsi), 17);
    assert_eq!(
        rcc.plls().configure(F1Pll::Pll, &cfg),
        Err(ClockFault::Config(ConfigError::ValueOutOfRange {
            what: "PLLMUL",
            value: 17
        }))
    );
    assert!(rcc.bus().writes().is_empty());
}

#[test]
fn pll_output_range_is_checked() {
    let state = FrequencyState::new(F1::RESET_CLOCKS);
    let mut rcc = f1_rcc(&state);
    // 4 MHz x 2 = 8 MHz, below the 16 MHz floor.
    let cfg = PllConfig::new(PllInput::Osc(F1Osc::Hsi), 2);
    assert!(matches!(
        rcc.plls().configure(F1Pll::Pll, &cfg),
        Err(ClockFault::Config(ConfigError::FrequencyOutOfRange { what: "PLL", .. }))
    ));
    assert!(rcc.bus().writes().is_empty());
}

#[test]
fn pll_configure_refused_while_enabled() {
    let state = FrequencyState::new(F1::RESET_CLOCKS);
    let mut rcc = f1_rcc(&state);
    rcc.apply(&f1::presets::hsi_out_48mhz().unwrap(), &mut PollLimit::new(1_000))
        .unwrap();
    rcc.bus().clear_writes();

    let cfg = PllConfig::new(PllInput::Osc(F1Osc::Hsi), 10);
    assert_eq!(
        rcc.plls().configure(F1Pll::Pll, &cfg),
        Err(ClockFault::ConfigWhileEnabled("PLL"))
    );
    assert_eq!(rcc.plls().disable(F1Pll::Pll), Err(ClockFault::SourceInUse("PLL")));
    assert!(rcc.bus().writes().is_empty());
}

#[test]
fn switch_to_unready_source_writes_nothing() {
    let state = FrequencyState::new(F1::RESET_CLOCKS);
    let mut rcc = f1_rcc(&state);
    assert_eq!(
        rcc.switch().select_source(F1Osc::Hse),
        Err(ClockFault::SourceNotReady("HSE"))
    );
    assert_eq!(
        rcc.switch().select_source(F1Osc::Lsi),
        Err(ClockFault::Config(ConfigError::NotSystemClock("LSI")))
    );
    assert!(rcc.bus().writes().is_empty());
    assert_eq!(rcc.switch().current_source(), F1Osc::Hsi);
}

#[test]
fn current_source_decodes_switch_status() {
    let state = FrequencyState::new(F1::RESET_CLOCKS);
    let mut rcc = f1_rcc(&state);
    for (osc, code) in [(F1Osc::Hsi, 0), (F1Osc::Hse, 1), (F1Osc::Pll, 2)] {
        rcc.bus().freeze_switch(true);
        rcc.bus().poke(f1r::SWS, code);
        assert_eq!(rcc.switch().current_source(), osc);
    }
    // Reserved code.
    rcc.bus().poke(f1r::SWS, 3);
    assert_eq!(rcc.switch().current_source(), F1Osc::Hsi);
}

#[test]
fn manual_bring_up_through_views() {
    let state = FrequencyState::new(F1::RESET_CLOCKS);
    let mut rcc = Rcc::<F1, _>::new(SimBus::<F1>::new(), &state, hse8());
    let mut t = PollLimit::new(1_000);

    assert_eq!(rcc.oscillators().state(F1Osc::Hse), OscState::Off);
    rcc.oscillators().enable(F1Osc::Hse);
    assert_eq!(rcc.oscillators().state(F1Osc::Hse), OscState::Starting);
    rcc.oscillators().wait_ready(F1Osc::Hse, &mut t).unwrap();
    assert_eq!(
        rcc.oscillators().set_bypass(F1Osc::Hse, true),
        Err(ClockFault::ConfigWhileEnabled("HSE"))
    );
    assert_eq!(
        rcc.oscillators().set_bypass(F1Osc::Hsi, true),
        Err(ClockFault::Config(ConfigError::NotBypassable("HSI")))
    );

    let cfg = PllConfig::new(PllInput::Osc(F1Osc::Hse), 6);
    rcc.plls().configure(F1Pll::Pll, &cfg).unwrap();
    rcc.plls().enable(F1Pll::Pll);
    rcc.plls().wait_ready(F1Pll::Pll, &mut t).unwrap();
    assert!(rcc.plls().is_locked(F1Pll::Pll));
    assert_eq!(rcc.plls().config(F1Pll::Pll), Some(cfg));
    assert_eq!(rcc.plls().output_frequency(F1Pll::Pll), Some(Hertz::mhz(48)));

    rcc.prescalers().set_apb1(ApbPrescaler::Div2);
    rcc.switch().select_source(F1Osc::Pll).unwrap();
    rcc.switch().wait_for_switch(F1Osc::Pll, &mut t).unwrap();
    assert_eq!(
        rcc.oscillators().disable(F1Osc::Hse),
        Err(ClockFault::SourceInUse("HSE"))
    );

    // Views do not publish; resync does.
    assert_eq!(state.clocks(), F1::RESET_CLOCKS);
    let clocks = rcc.resync().unwrap();
    assert_eq!(clocks, Clocks::new(Hertz::mhz(48), Hertz::mhz(48), Hertz::mhz(24), Hertz::mhz(48)));
    assert_eq!(state.current_apb1_frequency(), Hertz::mhz(24));
}

#[test]
fn capabilities_follow_family_tables() {
    let state = FrequencyState::new(F1::RESET_CLOCKS);
    let mut rcc = f1_rcc(&state);
    let hse = rcc.oscillators().capabilities(F1Osc::Hse);
    assert!(hse.bypassable && hse.pll_input && hse.rtc_source && hse.system_clock);
    let lsi = rcc.oscillators().capabilities(F1Osc::Lsi);
    assert!(!lsi.bypassable && !lsi.pll_input && lsi.rtc_source && !lsi.system_clock);
}

#[test]
fn clock_security_needs_running_hse() {
    let state = FrequencyState::new(F1::RESET_CLOCKS);
    let mut rcc = f1_rcc(&state);
    assert_eq!(rcc.oscillators().enable_css(), Err(ClockFault::SourceNotReady("HSE")));
    rcc.oscillators().enable(F1Osc::Hse);
    rcc.oscillators().wait_ready(F1Osc::Hse, &mut PollLimit::new(100)).unwrap();
    rcc.oscillators().enable_css().unwrap();
    assert_eq!(rcc.bus().peek_field(f1r::CSSON), 1);
    rcc.oscillators().disable_css().unwrap();
    assert_eq!(rcc.bus().peek_field(f1r::CSSON), 0);
}

#[test]
fn f1_hse_72mhz() {
    let state = FrequencyState::new(F1::RESET_CLOCKS);
    let mut rcc = f1_rcc(&state);
    let profile = f1::presets::hse_8mhz_out_72mhz().unwrap();
    rcc.apply(&profile, &mut PollLimit::new(1_000)).unwrap();

    assert_eq!(state.current_sysclk_frequency(), Hertz::mhz(72));
    assert_eq!(state.current_ahb_frequency(), Hertz::mhz(72));
    assert_eq!(state.current_apb1_frequency(), Hertz::mhz(36));
    assert_eq!(state.current_apb2_frequency(), Hertz::mhz(72));
    assert_eq!(rcc.apply_state(), ApplyState::Idle);
    assert_eq!(rcc.switch().current_source(), F1Osc::Pll);
    assert_eq!(rcc.board(), profile.board());

    let bus = rcc.bus();
    assert_eq!(bus.peek_field(f1r::PLLSRC), 1);
    assert_eq!(bus.peek_field(f1r::PLLMUL), 7);
    assert_eq!(bus.peek_field(f1r::PPRE1), 0b100);
    // APB1 is halved before SYSCLK reaches 72 MHz.
    assert!(bus.position(f1r::PPRE1, 0b100) < bus.position(f1r::SW, 2));
}

#[test]
fn reapplying_active_profile_writes_nothing() {
    let state = FrequencyState::new(F1::RESET_CLOCKS);
    let mut rcc = f1_rcc(&state);
    let profile = f1::presets::hse_8mhz_out_72mhz().unwrap();
    rcc.apply(&profile, &mut PollLimit::new(1_000)).unwrap();
    rcc.bus().clear_writes();

    rcc.apply(&profile, &mut PollLimit::new(1_000)).unwrap();
    assert!(rcc.bus().writes().is_empty());
    assert_eq!(state.clocks(), profile.clocks());
}

#[test]
fn readback_matches_published_clocks() {
    let state = FrequencyState::new(F1::RESET_CLOCKS);
    let mut rcc = f1_rcc(&state);
    for (name, preset) in f1::presets::ALL {
        let profile = preset().unwrap();
        rcc.apply(&profile, &mut PollLimit::new(1_000)).unwrap();
        assert_eq!(rcc.read_clocks(), Some(state.clocks()), "{}", name);
        assert_eq!(state.clocks(), profile.clocks(), "{}", name);
    }
}

#[test]
fn reprogramming_the_running_pll_parks_on_hsi() {
    let state = FrequencyState::new(F1::RESET_CLOCKS);
    let mut rcc = f1_rcc(&state);
    rcc.apply(&f1::presets::hse_8mhz_out_72mhz().unwrap(), &mut PollLimit::new(1_000))
        .unwrap();
    rcc.bus().clear_writes();

    rcc.apply(&f1::presets::hsi_out_64mhz().unwrap(), &mut PollLimit::new(1_000))
        .unwrap();
    let bus = rcc.bus();
    let park = bus.position(f1r::SW, 0).unwrap();
    let off = bus.position(f1r::PLLON, 0).unwrap();
    let mul = bus.position(f1r::PLLMUL, 14).unwrap();
    let on = bus.position(f1r::PLLON, 1).unwrap();
    let back = bus.position(f1r::SW, 2).unwrap();
    assert!(park < off && off < mul && mul < on && on < back);
    assert_eq!(state.current_sysclk_frequency(), Hertz::mhz(64));
    // Forward transitions leave unused oscillators running.
    assert_eq!(bus.peek_field(f1r::HSEON), 1);
}

#[test]
fn dead_hse_times_out_and_rolls_back() {
    let state = FrequencyState::new(F1::RESET_CLOCKS);
    let mut rcc = f1_rcc(&state);
    rcc.bus().kill(F1Osc::Hse);
    let clock = rcc.bus().clock();
    let mut deadline = SimDeadline::from_millis(clock.clone(), 10);

    let profile = f1::presets::hse_8mhz_out_72mhz().unwrap();
    assert_eq!(
        rcc.apply(&profile, &mut deadline),
        Err(ClockFault::Timeout(HardwareTimeout::Oscillator("HSE")))
    );
    assert_eq!(
        rcc.apply(&profile, &mut deadline).map_err(|e| e.kind()),
        Err(FaultKind::HardwareTimeout)
    );
    assert!(clock.now_us() < 25_000);
    assert_eq!(state.clocks(), F1::RESET_CLOCKS);
    assert_eq!(rcc.apply_state(), ApplyState::Idle);
    assert_eq!(rcc.bus().peek_field(f1r::HSEON), 0);
    assert_eq!(rcc.switch().current_source(), F1Osc::Hsi);
    assert_eq!(rcc.board(), &Board::new());
}

#[test]
fn stalled_switch_rolls_back() {
    let state = FrequencyState::new(F1::RESET_CLOCKS);
    let mut rcc = f1_rcc(&state);
    rcc.bus().freeze_switch(true);

    assert_eq!(
        rcc.apply(&f1::presets::hsi_out_64mhz().unwrap(), &mut PollLimit::new(1_000)),
        Err(ClockFault::Timeout(HardwareTimeout::Switch("PLL")))
    );
    let bus = rcc.bus();
    assert_eq!(bus.peek_field(f1r::SW), 0);
    assert_eq!(bus.peek_field(f1r::PPRE1), 0);
    assert_eq!(bus.peek_field(f1r::PLLON), 0);
    assert_eq!(bus.peek_field(f1r::HSION), 1);
    assert_eq!(state.clocks(), F1::RESET_CLOCKS);
}

#[test]
fn failed_rollback_publishes_hardware_state() {
    let state = FrequencyState::new(F1::RESET_CLOCKS);
    let mut rcc = f1_rcc(&state);
    rcc.apply(&f1::presets::hse_8mhz_out_72mhz().unwrap(), &mut PollLimit::new(1_000))
        .unwrap();
    rcc.bus().kill(F1Osc::Pll);

    assert_eq!(
        rcc.apply(&f1::presets::hsi_out_64mhz().unwrap(), &mut PollLimit::new(1_000)),
        Err(ClockFault::Timeout(HardwareTimeout::PllLock("PLL")))
    );
    // Parked on HSI with the old bus dividers still in place.
    assert_eq!(rcc.switch().current_source(), F1Osc::Hsi);
    assert_eq!(
        state.clocks(),
        Clocks::new(Hertz::mhz(8), Hertz::mhz(8), Hertz::mhz(4), Hertz::mhz(8))
    );
    assert_eq!(rcc.apply_state(), ApplyState::Idle);
}

#[test]
fn l1_raises_voltage_before_frequency() {
    let state = FrequencyState::new(L1::RESET_CLOCKS);
    let mut rcc = l1_rcc(&state);
    let profile = l1::presets::hsi_pll_out_32mhz().unwrap();
    assert_eq!(profile.scale(), L1Scale::Range1);
    rcc.apply(&profile, &mut PollLimit::new(1_000)).unwrap();

    let bus = rcc.bus();
    let vos = bus.position(l1r::VOS, 0b01).unwrap();
    let first_cfgr = bus.writes().iter().position(|w| w.reg == l1r::CFGR).unwrap();
    assert!(vos < first_cfgr);
    assert!(vos < bus.position(l1r::PLLON, 1).unwrap());
    assert_eq!(bus.peek_field(l1r::PLLMUL), 2);
    assert_eq!(bus.peek_field(l1r::PLLDIV), 2);
    assert_eq!(state.current_sysclk_frequency(), Hertz::mhz(32));
    assert_eq!(rcc.regulator().current_scale(), L1Scale::Range1);
}

#[test]
fn l1_lowers_voltage_after_frequency() {
    let state = FrequencyState::new(L1::RESET_CLOCKS);
    let mut rcc = l1_rcc(&state);
    rcc.apply(&l1::presets::hsi_pll_out_32mhz().unwrap(), &mut PollLimit::new(1_000))
        .unwrap();
    rcc.bus().clear_writes();

    let profile = l1::presets::msi_low_power().unwrap();
    rcc.apply(&profile, &mut PollLimit::new(1_000)).unwrap();

    let bus = rcc.bus();
    let vos = bus.position(l1r::VOS, 0b11).unwrap();
    let last_cfgr = bus.writes().iter().rposition(|w| w.reg == l1r::CFGR).unwrap();
    assert!(last_cfgr < vos);
    // Range 3 cannot run the PLL: it is stopped before the range drops.
    assert!(bus.position(l1r::PLLON, 0).unwrap() < vos);
    assert_eq!(bus.peek_field(l1r::PLLON), 0);
    assert_eq!(
        state.clocks(),
        Clocks::new(
            Hertz::hz(2_097_000),
            Hertz::hz(1_048_500),
            Hertz::hz(1_048_500),
            Hertz::hz(1_048_500)
        )
    );
    assert_eq!(rcc.regulator().current_scale(), L1Scale::Range3);
}

#[test]
fn l1_scale_selection() {
    assert_eq!(l1::presets::hsi_out_16mhz().unwrap().scale(), L1Scale::Range2);
    assert_eq!(l1::presets::msi_low_power().unwrap().scale(), L1Scale::Range3);

    let too_low = ProfileBuilder::<L1>::new(Board::new())
        .with_source(L1Osc::Hsi)
        .with_scale(L1Scale::Range3)
        .build();
    assert_eq!(
        too_low.map(|p| p.clocks()),
        Err(ClockFault::Invariant(InvariantViolation::ScaleTooLow {
            scale: "range3",
            bus: Bus::Sysclk,
            freq: Hertz::mhz(16),
            limit: Hertz::mhz(4),
        }))
    );

    let no_pll = ProfileBuilder::<L1>::new(Board::new())
        .with_pll(L1Pll::Pll, PllConfig::new(PllInput::Osc(L1Osc::Hsi), 3).with_postdiv(4))
        .with_source(L1Osc::Pll)
        .with_scale(L1Scale::Range3)
        .build();
    assert_eq!(
        no_pll.map(|p| p.clocks()),
        Err(ClockFault::Invariant(InvariantViolation::PllNotAllowed { scale: "range3" }))
    );
}

#[test]
fn profile_validation() {
    let over = ProfileBuilder::<F1>::new(Board::new())
        .with_pll(F1Pll::Pll, PllConfig::new(PllInput::Osc(F1Osc::Hsi), 16))
        .with_source(F1Osc::Pll)
        .build();
    assert_eq!(
        over.map(|p| p.clocks()),
        Err(ClockFault::Config(ConfigError::BusOverLimit {
            bus: Bus::Apb1,
            freq: Hertz::mhz(64),
            limit: Hertz::mhz(36),
        }))
    );

    let no_hse = ProfileBuilder::<F1>::new(Board::new())
        .with_pll(F1Pll::Pll, PllConfig::new(PllInput::Osc(F1Osc::Hse), 9))
        .with_source(F1Osc::Pll)
        .build();
    assert_eq!(
        no_hse.map(|p| p.clocks()),
        Err(ClockFault::Config(ConfigError::MissingExternalClock("HSE")))
    );

    let lse = ProfileBuilder::<F1>::new(Board::new()).with_source(F1Osc::Lse).build();
    assert_eq!(
        lse.map(|p| p.clocks()),
        Err(ClockFault::Config(ConfigError::NotSystemClock("LSE")))
    );

    let unconfigured = ProfileBuilder::<F1>::new(Board::new()).with_source(F1Osc::Pll).build();
    assert_eq!(
        unconfigured.map(|p| p.clocks()),
        Err(ClockFault::Config(ConfigError::PllMissing("PLL")))
    );

    let fast_crystal = ProfileBuilder::<F1>::new(Board::new().with_hse(ExternalClock::crystal(Hertz::mhz(20))))
        .with_source(F1Osc::Hse)
        .build();
    assert!(matches!(
        fast_crystal,
        Err(ClockFault::Config(ConfigError::FrequencyOutOfRange { what: "HSE", .. }))
    ));
}

#[test]
fn f1cl_shared_divider_conflict() {
    let board = Board::new().with_hse(ExternalClock::crystal(Hertz::mhz(25)));
    let conflict = ProfileBuilder::<F1Cl>::new(board)
        .with_pll(ClPll::Pll2, PllConfig::new(PllInput::Osc(ClOsc::Hse), 8).with_prediv(5))
        .with_pll(ClPll::Pll3, PllConfig::new(PllInput::Osc(ClOsc::Hse), 10).with_prediv(6))
        .build();
    assert_eq!(
        conflict.map(|p| p.clocks()),
        Err(ClockFault::Config(ConfigError::SharedDividerConflict("PREDIV2")))
    );
}

#[test]
fn f1cl_cascade_brings_up_pll2_first() {
    let state = FrequencyState::new(F1Cl::RESET_CLOCKS);
    let mut rcc = Rcc::<F1Cl, _>::new(SimBus::<F1Cl>::new(), &state, Board::new());
    let profile = f1cl::presets::hse_25mhz_out_72mhz().unwrap();
    rcc.apply(&profile, &mut PollLimit::new(1_000)).unwrap();

    let pll2on = Field::bit(f1r::CR, 26);
    let bus = rcc.bus();
    assert!(bus.position(pll2on, 1).unwrap() < bus.position(f1r::PLLON, 1).unwrap());
    assert_eq!(state.current_sysclk_frequency(), Hertz::mhz(72));
    assert_eq!(rcc.read_clocks(), Some(profile.clocks()));
    assert_eq!(rcc.plls().output_frequency(ClPll::Pll2), Some(Hertz::mhz(40)));
    assert_eq!(
        rcc.plls().config(ClPll::Pll).map(|c| c.input),
        Some(PllInput::Pll(ClPll::Pll2))
    );
}

#[test]
fn f1cl_cascade_reprogram_stops_downstream_first() {
    let state = FrequencyState::new(F1Cl::RESET_CLOCKS);
    let mut rcc = Rcc::<F1Cl, _>::new(SimBus::<F1Cl>::new(), &state, Board::new());
    let profile = f1cl::presets::hse_25mhz_out_72mhz().unwrap();
    rcc.apply(&profile, &mut PollLimit::new(1_000)).unwrap();
    rcc.bus().clear_writes();

    // PLL2 x10 = 50 MHz, PLL /5 x7 = 70 MHz.
    let next = ProfileBuilder::<F1Cl>::new(*profile.board())
        .with_pll(ClPll::Pll2, PllConfig::new(PllInput::Osc(ClOsc::Hse), 10).with_prediv(5))
        .with_pll(ClPll::Pll, PllConfig::new(PllInput::Pll(ClPll::Pll2), 7).with_prediv(5))
        .with_source(ClOsc::Pll)
        .with_apb1(ApbPrescaler::Div2)
        .build()
        .unwrap();
    rcc.apply(&next, &mut PollLimit::new(1_000)).unwrap();

    let pll2on = Field::bit(f1r::CR, 26);
    let bus = rcc.bus();
    let park = bus.position(f1r::SW, 0).unwrap();
    let pll_off = bus.position(f1r::PLLON, 0).unwrap();
    let pll2_off = bus.position(pll2on, 0).unwrap();
    let pll2_on = bus.position(pll2on, 1).unwrap();
    let pll_on = bus.position(f1r::PLLON, 1).unwrap();
    assert!(park < pll_off && pll_off < pll2_off && pll2_off < pll2_on && pll2_on < pll_on);
    assert_eq!(state.current_sysclk_frequency(), Hertz::mhz(70));
}

#[test]
fn f1cl_shared_divider_user_is_stopped_before_reprogram() {
    let state = FrequencyState::new(F1Cl::RESET_CLOCKS);
    let board = Board::new().with_hse(ExternalClock::crystal(Hertz::mhz(25)));
    let mut rcc = Rcc::<F1Cl, _>::new(SimBus::<F1Cl>::new(), &state, board);

    // PLL3 runs from the same PREDIV2 as PLL2.
    let first = ProfileBuilder::<F1Cl>::new(board)
        .with_pll(ClPll::Pll2, PllConfig::new(PllInput::Osc(ClOsc::Hse), 8).with_prediv(5))
        .with_pll(ClPll::Pll3, PllConfig::new(PllInput::Osc(ClOsc::Hse), 10).with_prediv(5))
        .with_pll(ClPll::Pll, PllConfig::new(PllInput::Pll(ClPll::Pll2), 9).with_prediv(5))
        .with_source(ClOsc::Pll)
        .with_apb1(ApbPrescaler::Div2)
        .build()
        .unwrap();
    rcc.apply(&first, &mut PollLimit::new(1_000)).unwrap();
    assert!(rcc.plls().is_locked(ClPll::Pll3));
    rcc.bus().clear_writes();

    // PREDIV2 moves to /6 and PLL3 is no longer wanted.
    let next = ProfileBuilder::<F1Cl>::new(board)
        .with_pll(ClPll::Pll2, PllConfig::new(PllInput::Osc(ClOsc::Hse), 12).with_prediv(6))
        .with_pll(ClPll::Pll, PllConfig::new(PllInput::Pll(ClPll::Pll2), 7).with_prediv(5))
        .with_source(ClOsc::Pll)
        .with_apb1(ApbPrescaler::Div2)
        .build()
        .unwrap();
    rcc.apply(&next, &mut PollLimit::new(1_000)).unwrap();

    let pll3on = Field::bit(f1r::CR, 28);
    let bus = rcc.bus();
    assert_eq!(bus.peek_field(pll3on), 0);
    assert_eq!(bus.peek_field(f1cl::PREDIV2), 5);
    assert!(bus.position(pll3on, 0).unwrap() < bus.position(f1cl::PREDIV2, 5).unwrap());
    assert_eq!(state.current_sysclk_frequency(), Hertz::mhz(70));
    assert!(!rcc.plls().is_enabled(ClPll::Pll3));
}

#[test]
fn f1cl_uneven_prediv_keeps_exact_frequencies() {
    // 25 MHz / 6 is not a whole number of hertz; x12 still lands on 50 MHz.
    let board = Board::new().with_hse(ExternalClock::crystal(Hertz::mhz(25)));
    let profile = ProfileBuilder::<F1Cl>::new(board)
        .with_pll(ClPll::Pll2, PllConfig::new(PllInput::Osc(ClOsc::Hse), 12).with_prediv(6))
        .with_pll(ClPll::Pll, PllConfig::new(PllInput::Pll(ClPll::Pll2), 7).with_prediv(5))
        .with_source(ClOsc::Pll)
        .with_apb1(ApbPrescaler::Div2)
        .build()
        .unwrap();
    let clocks = profile.clocks();
    assert_eq!(clocks.sysclk, Hertz::mhz(70));
    assert_eq!(clocks.ahb, Hertz::mhz(70));
    assert_eq!(clocks.apb1, Hertz::mhz(35));
    assert_eq!(clocks.apb2, Hertz::mhz(70));

    let state = FrequencyState::new(F1Cl::RESET_CLOCKS);
    let mut rcc = Rcc::<F1Cl, _>::new(SimBus::<F1Cl>::new(), &state, board);
    rcc.apply(&profile, &mut PollLimit::new(1_000)).unwrap();
    assert_eq!(state.current_sysclk_frequency(), Hertz::mhz(70));
    assert_eq!(rcc.read_clocks(), Some(clocks));
    assert_eq!(rcc.plls().output_frequency(ClPll::Pll2), Some(Hertz::mhz(50)));
    assert_eq!(rcc.plls().output_frequency(ClPll::Pll), Some(Hertz::mhz(70)));
}

#[test]
fn pll_ratio_reduces_before_rounding() {
    let r = super::pll::Ratio::hz(Hertz::mhz(25)).scale(1, 6);
    assert_eq!(r.to_hertz(), Hertz(4_166_666));
    assert_eq!(r.scale(12, 1).to_hertz(), Hertz::mhz(50));
    assert_eq!(r.scale(12, 5).scale(7, 1).to_hertz(), Hertz::mhz(70));
    assert_eq!(super::pll::Ratio::hz(Hertz(u32::MAX)).scale(2, 1).to_hertz(), Hertz(u32::MAX));
}

#[test]
fn rtc_source_is_locked_until_backup_reset() {
    let state = FrequencyState::new(F1::RESET_CLOCKS);
    let mut rcc = f1_rcc(&state);
    let mut t = PollLimit::new(100);

    assert_eq!(rcc.set_rtc_source(F1Osc::Lse), Err(ClockFault::SourceNotReady("LSE")));
    assert_eq!(
        rcc.set_rtc_source(F1Osc::Pll),
        Err(ClockFault::Config(ConfigError::NotRtcSource("PLL")))
    );

    rcc.oscillators().enable(F1Osc::Lse);
    rcc.oscillators().wait_ready(F1Osc::Lse, &mut t).unwrap();
    rcc.set_rtc_source(F1Osc::Lse).unwrap();
    assert_eq!(rcc.rtc_source(), Some(F1Osc::Lse));
    assert_eq!(rcc.bus().peek_field(f1r::RTCEN), 1);

    rcc.oscillators().enable(F1Osc::Lsi);
    rcc.oscillators().wait_ready(F1Osc::Lsi, &mut t).unwrap();
    assert_eq!(
        rcc.set_rtc_source(F1Osc::Lsi),
        Err(ClockFault::Config(ConfigError::RtcSourceLocked))
    );
    // Selecting the same source again is fine.
    rcc.set_rtc_source(F1Osc::Lse).unwrap();

    rcc.backup_domain_reset().unwrap();
    assert_eq!(rcc.rtc_source(), None);
    assert_eq!(rcc.bus().peek_field(f1r::LSEON), 0);
    assert_eq!(rcc.bus().peek_field(f1r::BDRST), 0);
    rcc.set_rtc_source(F1Osc::Lsi).unwrap();
    assert_eq!(rcc.rtc_source(), Some(F1Osc::Lsi));
}

#[test]
fn lse_enable_unlocks_backup_domain() {
    let state = FrequencyState::new(L1::RESET_CLOCKS);
    let mut rcc = l1_rcc(&state);
    rcc.oscillators().enable(L1Osc::Lse);
    let bus = rcc.bus();
    assert!(bus.position(l1r::DBP, 1).unwrap() < bus.position(l1r::LSEON, 1).unwrap());
    assert_eq!(bus.peek_field(l1r::PWREN), 1);
}

#[test]
fn peripheral_gates() {
    use crate::family::f1::periph::{Dma1, Usart1};

    let state = FrequencyState::new(F1::RESET_CLOCKS);
    let mut rcc = f1_rcc(&state);
    let usart_en = Field::bit(f1r::APB2ENR, 14);
    let usart_rst = Field::bit(f1r::APB2RSTR, 14);

    rcc.enable_and_reset::<Usart1>();
    assert!(rcc.is_enabled::<Usart1>());
    let bus = rcc.bus();
    assert_eq!(bus.peek_field(usart_en), 1);
    assert!(bus.position(usart_rst, 1).unwrap() < bus.position(usart_rst, 0).unwrap());
    assert_eq!(bus.peek_field(usart_rst), 0);

    rcc.disable::<Usart1>();
    assert!(!rcc.is_enabled::<Usart1>());

    // No reset line: reset is a no-op.
    rcc.bus().clear_writes();
    rcc.reset::<Dma1>();
    assert!(rcc.bus().writes().is_empty());
    rcc.enable::<Dma1>();
    assert!(rcc.is_enabled::<Dma1>());
}

#[test]
fn frequency_states_are_independent() {
    let a = FrequencyState::new(F1::RESET_CLOCKS);
    let b = FrequencyState::new(F1::RESET_CLOCKS);
    let mut ra = f1_rcc(&a);
    let mut rb = f1_rcc(&b);
    ra.apply(&f1::presets::hse_8mhz_out_72mhz().unwrap(), &mut PollLimit::new(1_000))
        .unwrap();
    rb.apply(&f1::presets::hsi_out_48mhz().unwrap(), &mut PollLimit::new(1_000))
        .unwrap();
    assert_eq!(a.current_sysclk_frequency(), Hertz::mhz(72));
    assert_eq!(b.current_sysclk_frequency(), Hertz::mhz(48));
    assert_eq!(ra.frequencies().current_apb1_frequency(), Hertz::mhz(36));
}

#[test]
fn every_preset_applies_from_reset() {
    for (name, preset) in f1cl::presets::ALL {
        let state = FrequencyState::new(F1Cl::RESET_CLOCKS);
        let mut rcc = Rcc::<F1Cl, _>::new(SimBus::<F1Cl>::new(), &state, Board::new());
        let profile = preset().unwrap();
        rcc.apply(&profile, &mut PollLimit::new(1_000)).unwrap();
        assert_eq!(state.clocks(), profile.clocks(), "{}", name);
    }
    for (name, preset) in l1::presets::ALL {
        let state = FrequencyState::new(L1::RESET_CLOCKS);
        let mut rcc = l1_rcc(&state);
        let profile = preset().unwrap();
        rcc.apply(&profile, &mut PollLimit::new(1_000)).unwrap();
        assert_eq!(rcc.read_clocks(), Some(profile.clocks()), "{}", name);
    }
}
