use super::*;

fn parse(text: &str) -> ProfileFile {
    serde_hjson::from_str(text).unwrap()
}

#[test]
fn bundled_f105_profile_builds() {
    let file = parse(include_str!("../profiles/f105_ethernet.hjson"));
    assert_eq!(file.family.as_deref(), Some("f1cl"));
    let profile = build::<F1Cl>(&file).unwrap();
    let clocks = profile.clocks();
    assert_eq!(clocks.sysclk, Hertz::mhz(72));
    assert_eq!(clocks.apb1, Hertz::mhz(36));
    assert_eq!(clocks.apb2, Hertz::mhz(72));
    assert_eq!(profile.plls().iter().count(), 2);
}

#[test]
fn bundled_l1_profile_builds() {
    let file = parse(include_str!("../profiles/l1_hse_32mhz.hjson"));
    assert_eq!(file.family.as_deref(), Some("l1"));
    let profile = build::<L1>(&file).unwrap();
    assert_eq!(profile.clocks().sysclk, Hertz::mhz(32));
    assert_eq!(profile.scale().name(), "range1");
}

#[test]
fn bad_divider_is_rejected() {
    let file = parse(
        r#"{
          hse: {
            freq: 8000000
          }
          source: HSE
          apb1: 3
        }"#,
    );
    let err = build::<F1>(&file).unwrap_err();
    assert!(err.to_string().contains("invalid APB1 divider 3"), "{}", err);
}

#[test]
fn unknown_names_are_rejected() {
    let file = parse(
        r#"{
          source: HSX
        }"#,
    );
    let err = build::<F1>(&file).unwrap_err();
    assert!(err.to_string().contains("no oscillator named HSX"), "{}", err);

    let file = parse(
        r#"{
          source: HSI
          scale: range9
        }"#,
    );
    assert!(build::<L1>(&file).is_err());
}

#[test]
fn out_of_range_pll_fails_to_build() {
    // 8 MHz x16 is beyond the F1 PLL output range.
    let file = parse(
        r#"{
          hse: {
            freq: 8000000
          }
          source: PLL
          plls: [
            {
              pll: PLL
              input: HSE
              mul: 16
            }
          ]
        }"#,
    );
    assert!(build::<F1>(&file).is_err());
}
