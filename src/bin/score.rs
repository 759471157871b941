//! One-shot label scorer.
//!
//! Usage:
//!   cardia-score [--hr=<bpm>] [--qrs=<ms>] [--st=<mV>] [--pr=<ms>]
//!
//! Unset parameters keep their defaults (72 bpm, 90 ms, 0.0 mV, 160 ms).
//! Values are clamped and snapped like the live sliders. Prints the ranked
//! scores as JSON.

use anyhow::{anyhow, bail, Result};
use serde_json::json;

use cardia::logging::log_scores;
use cardia::params::{ClinicalParameters, Param};
use cardia::scorer::{primary, score, spectrum};

fn parse_args(args: &[String]) -> Result<ClinicalParameters> {
    let mut params = ClinicalParameters::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let Some(flag) = arg.strip_prefix("--") else {
            bail!("unexpected argument '{}'", arg);
        };
        // accept both --hr=150 and --hr 150
        let (name, raw) = match flag.split_once('=') {
            Some((name, raw)) => (name, raw.to_string()),
            None => {
                let raw = iter
                    .next()
                    .ok_or_else(|| anyhow!("--{} needs a value", flag))?;
                (flag, raw.clone())
            }
        };
        let param: Param = name.parse().map_err(|e: String| anyhow!(e))?;
        let value: f64 = raw
            .parse()
            .map_err(|_| anyhow!("--{}: '{}' is not a number", name, raw))?;
        if param.normalize(value).is_none() {
            bail!("--{}: value must be finite", name);
        }
        params.set(param, value);
    }
    Ok(params)
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        eprintln!("usage: cardia-score [--hr=<bpm>] [--qrs=<ms>] [--st=<mV>] [--pr=<ms>]");
        return Ok(());
    }

    let params = parse_args(&args)?;
    let scores = score(&params);
    log_scores(&params, &scores);

    let out = json!({
        "params": params,
        "primary": primary(&scores),
        "spectrum": spectrum(&scores),
        "scores": scores,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
