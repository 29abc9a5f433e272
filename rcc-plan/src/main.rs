use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, ValueEnum};
use serde::Deserialize;

use rcc_hal::family::{self, f1, f1cl, l1, F1Cl, Family, F1, L1};
use rcc_hal::rcc::{
    AhbPrescaler, ApbPrescaler, Board, ClockFault, ClockProfile, ExternalClock, FrequencyState, PllConfig, PllInput,
    PollLimit, ProfileBuilder, Rcc, VoltageScale,
};
use rcc_hal::sim::SimBus;
use rcc_hal::time::Hertz;

#[cfg(test)]
mod tests;

#[derive(Parser, Debug)]
#[command(author, version, about = "Checks a clock profile and prints the register writes that apply it")]
struct Args {
    /// Profile description (hjson)
    profile: Option<PathBuf>,

    /// Chip family, unless the profile names one
    #[arg(short, long, value_enum, default_value_t = FamilyArg::F1)]
    family: FamilyArg,

    /// Use a built-in profile instead of a file
    #[arg(short, long, conflicts_with = "profile")]
    preset: Option<String>,

    /// List the built-in profiles of the family
    #[arg(long)]
    list: bool,

    /// Print every register store
    #[arg(short, long)]
    trace: bool,

    /// Status polls allowed per hardware wait
    #[arg(long, default_value_t = 10_000)]
    polls: u32,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FamilyArg {
    F1,
    F1cl,
    L1,
}

#[derive(Deserialize, Debug)]
struct ExternalFile {
    /// Hz
    freq: u32,
    #[serde(default)]
    bypass: bool,
}

#[derive(Deserialize, Debug)]
struct PllFile {
    pll: String,
    input: String,
    #[serde(default = "one")]
    prediv: u8,
    mul: u8,
    #[serde(default = "one")]
    postdiv: u8,
}

#[derive(Deserialize, Debug)]
struct ProfileFile {
    family: Option<String>,
    hse: Option<ExternalFile>,
    lse: Option<ExternalFile>,
    source: String,
    #[serde(default)]
    plls: Vec<PllFile>,
    #[serde(default = "one")]
    ahb: u32,
    #[serde(default = "one")]
    apb1: u32,
    #[serde(default = "one")]
    apb2: u32,
    scale: Option<String>,
}

fn one<T: From<u8>>() -> T {
    T::from(1)
}

enum Source {
    File(ProfileFile),
    Preset(String),
}

type Preset<F> = (&'static str, fn() -> Result<ClockProfile<F>, ClockFault>);

fn external(file: &ExternalFile) -> ExternalClock {
    ExternalClock {
        freq: Hertz(file.freq),
        bypass: file.bypass,
    }
}

fn osc<F: Family>(name: &str) -> Result<F::Osc> {
    family::osc_by_name::<F>(name).ok_or_else(|| anyhow!("{} has no oscillator named {}", F::NAME, name))
}

fn build<F: Family>(file: &ProfileFile) -> Result<ClockProfile<F>> {
    let mut board = Board::new();
    board.hse = file.hse.as_ref().map(external);
    board.lse = file.lse.as_ref().map(external);

    let mut builder = ProfileBuilder::<F>::new(board).with_source(osc::<F>(&file.source)?);
    for p in &file.plls {
        let pll = family::pll_by_name::<F>(&p.pll).ok_or_else(|| anyhow!("{} has no PLL named {}", F::NAME, p.pll))?;
        let input = match family::pll_by_name::<F>(&p.input) {
            Some(up) => PllInput::Pll(up),
            None => PllInput::Osc(osc::<F>(&p.input)?),
        };
        let config = PllConfig::new(input, p.mul).with_prediv(p.prediv).with_postdiv(p.postdiv);
        builder = builder.with_pll(pll, config);
    }

    builder = builder
        .with_ahb(AhbPrescaler::from_divisor(file.ahb).ok_or_else(|| anyhow!("invalid AHB divider {}", file.ahb))?)
        .with_apb1(ApbPrescaler::from_divisor(file.apb1).ok_or_else(|| anyhow!("invalid APB1 divider {}", file.apb1))?)
        .with_apb2(ApbPrescaler::from_divisor(file.apb2).ok_or_else(|| anyhow!("invalid APB2 divider {}", file.apb2))?);
    if let Some(name) = &file.scale {
        let scale = family::scale_by_name::<F>(name).ok_or_else(|| anyhow!("{} has no voltage scale {}", F::NAME, name))?;
        builder = builder.with_scale(scale);
    }

    Ok(builder.build()?)
}

fn run<F: Family>(args: &Args, source: &Source, presets: &[Preset<F>]) -> Result<()> {
    if args.list {
        for (name, _) in presets {
            println!("{}", name);
        }
        return Ok(());
    }

    let profile = match source {
        Source::File(file) => build::<F>(file)?,
        Source::Preset(name) => {
            let (_, preset) = presets
                .iter()
                .find(|(n, _)| *n == name.as_str())
                .ok_or_else(|| anyhow!("{} has no preset named {} (try --list)", F::NAME, name))?;
            preset()?
        }
    };

    println!("family:  {}", F::NAME);
    println!("source:  {}", F::oscillator(profile.source()).name);
    println!("scale:   {}", profile.scale().name());
    for (p, c) in profile.plls().iter() {
        println!(
            "{:<8} {} /{} x{} /{}",
            format!("{}:", F::oscillator(F::pll(p).osc).name),
            c.input.name(),
            c.prediv,
            c.mul,
            c.postdiv
        );
    }

    let state = FrequencyState::new(F::RESET_CLOCKS);
    let mut rcc = Rcc::<F, _>::new(SimBus::<F>::new(), &state, Board::new());
    rcc.apply(&profile, &mut PollLimit::new(args.polls))
        .context("applying the profile to a simulated chip")?;

    let clocks = state.clocks();
    println!("sysclk:  {}", clocks.sysclk);
    println!("ahb:     {}", clocks.ahb);
    println!("apb1:    {}", clocks.apb1);
    println!("apb2:    {}", clocks.apb2);

    let writes = rcc.bus().writes();
    if args.trace {
        for w in writes {
            println!("  {}", w);
        }
    }
    println!("{} register writes from reset", writes.len());
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let (source, family) = match (&args.profile, &args.preset) {
        (Some(path), _) => {
            let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            let file: ProfileFile =
                serde_hjson::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
            let family = match &file.family {
                Some(name) => FamilyArg::from_str(name, true).map_err(|e| anyhow!("{}", e))?,
                None => args.family,
            };
            (Source::File(file), family)
        }
        (None, Some(name)) => (Source::Preset(name.clone()), args.family),
        (None, None) if args.list => (Source::Preset(String::new()), args.family),
        (None, None) => bail!("give a profile file or --preset"),
    };

    match family {
        FamilyArg::F1 => run::<F1>(&args, &source, f1::presets::ALL),
        FamilyArg::F1cl => run::<F1Cl>(&args, &source, f1cl::presets::ALL),
        FamilyArg::L1 => run::<L1>(&args, &source, l1::presets::ALL),
    }
}
