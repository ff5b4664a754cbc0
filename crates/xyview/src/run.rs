use anyhow::{Context, Result};
use plotconfig::PlotConfig;
use tracing_subscriber::EnvFilter;
use xyplot::{Color, DataSource, ViewRect, XyPlot};

use crate::cli::Cli;
use crate::signal::{load_pairs, Signal};
use crate::window::{run_window, WindowOptions};

const SIGNAL_SEED: u64 = 0x5eed;

pub fn run(args: Cli) -> Result<()> {
    let config = resolve_config(&args)?;
    let mut plot = XyPlot::new();
    apply_config(&mut plot, &config);

    let mut source = DataSource::new();
    let signal = match args.data.as_ref() {
        Some(path) => {
            let data = load_pairs(path)?;
            source
                .set_data_f64(&data, data.len(), 1)
                .context("failed to load samples into the data source")?;
            tracing::info!(
                path = %path.display(),
                samples = source.sample_count(),
                "plotting samples from file"
            );
            None
        }
        None => {
            let mut signal = Signal::new(config.signal.kind, config.signal.points, SIGNAL_SEED);
            signal
                .write(&mut source)
                .context("failed to generate the initial signal")?;
            tracing::info!(
                kind = ?config.signal.kind,
                points = config.signal.points,
                interval = ?config.signal.interval,
                "plotting live signal"
            );
            Some(signal)
        }
    };

    run_window(WindowOptions::from_config(&config), plot, source, signal)
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Loads the configuration file (if any) and layers command-line overrides on top.
pub fn resolve_config(args: &Cli) -> Result<PlotConfig> {
    let mut config = match args.config.as_ref() {
        Some(path) => PlotConfig::from_path(path)
            .with_context(|| format!("failed to load plot config {}", path.display()))?,
        None => PlotConfig::default(),
    };

    if let Some(points) = args.points {
        config.signal.points = points;
    }
    if let Some((width, height)) = args.size {
        config.window.size = Some([width, height]);
    }
    if let Some(fps) = args.fps {
        config.window.fps = Some(fps);
    }
    if let Some(antialias) = args.antialias {
        config.window.antialias = Some(antialias);
    }
    if args.log_y {
        config.log_y = true;
    }

    config.validate().context("invalid plot settings")?;
    Ok(config)
}

pub fn apply_config(plot: &mut XyPlot, config: &PlotConfig) {
    let [x, y, width, height] = config.view.rect;
    plot.set_view_rect(ViewRect::new(x, y, width, height));
    plot.set_log_y(config.log_y);

    plot.set_fill_enabled(config.fill.enabled);
    plot.set_fill_color(Color::from(config.fill.color.0));

    plot.set_line_enabled(config.line.enabled);
    plot.set_line_width(config.line.width);
    plot.set_line_color(Color::from(config.line.color.0));

    plot.set_marker_enabled(config.marker.enabled);
    plot.set_marker_size(config.marker.size);
    plot.set_marker_segments(config.marker.segments);
    plot.set_marker_border(config.marker.border);
    plot.set_marker_color(Color::from(config.marker.color.0));
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use plotconfig::AntialiasSetting;
    use xyplot::PlotEvent;

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plot.toml");
        std::fs::write(
            &path,
            "version = 1\n[signal]\npoints = 32\n[window]\nsize = [400, 300]\nantialias = 4\n",
        )
        .unwrap();

        let args = Cli::try_parse_from([
            "xyview",
            "--config",
            path.to_str().unwrap(),
            "--points",
            "8",
            "--antialias",
            "2",
            "--log-y",
        ])
        .unwrap();
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.signal.points, 8);
        assert_eq!(config.window.size, Some([400, 300]));
        assert_eq!(config.window.antialias, Some(AntialiasSetting::Samples2));
        assert!(config.log_y);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let args = Cli::try_parse_from(["xyview", "--config", "/nonexistent/plot.toml"]).unwrap();
        let err = resolve_config(&args).unwrap_err();
        assert!(format!("{err:#}").contains("failed to load plot config"));
    }

    #[test]
    fn negative_fps_is_rejected() {
        let args = Cli::try_parse_from(["xyview", "--fps=-5"]).unwrap();
        assert!(resolve_config(&args).is_err());
    }

    #[test]
    fn config_styles_the_plot() {
        let config = PlotConfig::from_toml_str(
            "version = 1\nlog_y = true\n[view]\nrect = [1.0, 2.0, 3.0, 4.0]\n\
             [marker]\nenabled = true\nsegments = 4\ncolor = \"#ff0000\"\n",
        )
        .unwrap();
        let mut plot = XyPlot::new();
        apply_config(&mut plot, &config);

        assert_eq!(plot.view_rect(), ViewRect::new(1.0, 2.0, 3.0, 4.0));
        assert!(plot.log_y());
        assert!(plot.marker().enabled);
        assert_eq!(plot.marker().segments, 4);
        assert_eq!(plot.marker().color, Color::new(1.0, 0.0, 0.0, 1.0));

        let events = plot.drain_events();
        assert!(events.contains(&PlotEvent::LogYChanged(true)));
        assert!(events.contains(&PlotEvent::MarkerEnabledChanged(true)));
    }
}
