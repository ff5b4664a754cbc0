use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "xyview",
    author,
    version,
    about = "Live x/y plot preview",
    arg_required_else_help = false
)]
pub struct Cli {
    /// Plot configuration TOML (view rectangle, layer styling, signal).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Plot a fixed JSON array of `[x, y]` pairs instead of a live signal.
    #[arg(long, value_name = "FILE.json")]
    pub data: Option<PathBuf>,

    /// Number of samples in the synthetic signal.
    #[arg(long, value_name = "N")]
    pub points: Option<usize>,

    /// Initial window size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Optional cap on signal updates per second (0=uncapped).
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Plot y on a base-10 logarithmic scale.
    #[arg(long)]
    pub log_y: bool,

    /// Anti-aliasing: `off` or an MSAA sample count (2, 4, 8).
    #[arg(long, value_name = "MODE", value_parser = plotconfig::parse_antialias)]
    pub antialias: Option<plotconfig::AntialiasSetting>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT".to_string())?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid width '{w}'"))?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid height '{h}'"))?;
    if width == 0 || height == 0 {
        return Err("window dimensions must be greater than zero".into());
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_window_sizes() {
        assert_eq!(parse_size("1280x720").unwrap(), (1280, 720));
        assert_eq!(parse_size(" 640 X 480 ").unwrap(), (640, 480));
        assert!(parse_size("1280").is_err());
        assert!(parse_size("0x720").is_err());
        assert!(parse_size("wide x tall").is_err());
    }

    #[test]
    fn parses_flags() {
        let cli = Cli::try_parse_from([
            "xyview",
            "--points",
            "64",
            "--size",
            "800x600",
            "--log-y",
            "--antialias",
            "off",
        ])
        .unwrap();
        assert_eq!(cli.points, Some(64));
        assert_eq!(cli.size, Some((800, 600)));
        assert!(cli.log_y);
        assert_eq!(cli.antialias, Some(plotconfig::AntialiasSetting::Off));
        assert!(cli.config.is_none() && cli.data.is_none());
    }
}
