//! Command line interface

use std::path::PathBuf;

use clap::{ArgGroup, Parser};

use crate::{
    color::Argb,
    pattern::{Pattern, PatternConfig, PatternScale},
    xbm::{XbmError, XbmImage},
};

/// Root window style wallpapers for wlroots compositors
#[derive(Debug, Parser)]
#[command(name = "wlrsetroot", version, about)]
#[command(group(ArgGroup::new("pattern").args(["bitmap", "grid", "gray", "solid"])))]
pub struct Cli {
    /// Tile the XBM file as pattern
    #[arg(long, value_name = "FILE")]
    pub bitmap: Option<PathBuf>,

    /// Plaid-like grid on a 16x16 tile, marking every X-th column and Y-th row
    #[arg(
        long = "mod",
        num_args = 2,
        value_names = ["X", "Y"],
        allow_negative_numbers = true
    )]
    pub grid: Option<Vec<i32>>,

    /// Gray checkerboard pattern
    #[arg(long, visible_alias = "grey")]
    pub gray: bool,

    /// Solid color, no pattern
    #[arg(long, value_name = "COLOR")]
    pub solid: Option<Argb>,

    /// Background color, `#rrggbb`
    #[arg(long, value_name = "COLOR")]
    pub bg: Option<Argb>,

    /// Foreground color, `#rrggbb`
    #[arg(long, value_name = "COLOR")]
    pub fg: Option<Argb>,

    /// Swap foreground and background colors
    #[arg(long, visible_alias = "rv")]
    pub reverse: bool,

    /// Scale the pattern by N (0.1 to 32)
    #[arg(long, value_name = "N", default_value = "1", value_parser = parse_scale)]
    pub scale: PatternScale,

    /// Wayland display to connect to instead of `$WAYLAND_DISPLAY`
    #[arg(long, value_name = "NAME")]
    pub display: Option<String>,
}

fn parse_scale(s: &str) -> Result<PatternScale, String> {
    let scale = s.parse::<f32>().map_err(|err| err.to_string())?;
    PatternScale::try_from(scale).map_err(|err| err.to_string())
}

impl Cli {
    /// Turns the arguments into the wallpaper configuration, loading the bitmap if any
    pub fn pattern_config(&self) -> Result<PatternConfig, XbmError> {
        let pattern = if let Some(path) = &self.bitmap {
            Pattern::Bitmap(XbmImage::load(path)?)
        } else if let Some(spacing) = &self.grid {
            Pattern::grid(spacing[0], spacing[1])
        } else if self.gray {
            Pattern::Gray
        } else {
            Pattern::Solid
        };

        Ok(PatternConfig {
            pattern,
            foreground: self.fg.unwrap_or(Argb::WHITE),
            // `--solid` is a background color spelled differently
            background: self.solid.or(self.bg).unwrap_or(Argb::BLACK),
            reverse: self.reverse,
            scale: self.scale,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clap::{error::ErrorKind, CommandFactory, Parser};

    use super::Cli;
    use crate::{
        color::Argb,
        pattern::{Pattern, PatternScale},
    };

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("wlrsetroot").chain(args.iter().copied()))
    }

    #[test]
    fn command_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_to_black_solid() {
        let config = parse(&[]).unwrap().pattern_config().unwrap();
        assert_eq!(config.pattern, Pattern::Solid);
        assert_eq!(config.background, Argb::BLACK);
        assert_eq!(config.foreground, Argb::WHITE);
        assert!(!config.reverse);
        assert_eq!(config.scale, PatternScale::default());
    }

    #[test]
    fn grid_with_colors() {
        let cli = parse(&["--mod", "16", "16", "--bg", "#282a36", "--fg", "44475a"]).unwrap();
        let config = cli.pattern_config().unwrap();
        assert_eq!(config.pattern, Pattern::grid(16, 16));
        assert_eq!(config.background, Argb(0xFF28_2A36));
        assert_eq!(config.foreground, Argb(0xFF44_475A));
    }

    #[test]
    fn grid_spacing_is_clamped() {
        let config = parse(&["--mod", "0", "-3"]).unwrap().pattern_config().unwrap();
        assert_eq!(config.pattern, Pattern::Grid { mod_x: 1, mod_y: 1 });
    }

    #[test]
    fn solid_sets_background() {
        let config = parse(&["--solid", "#1a1a2e", "--bg", "#ffffff"])
            .unwrap()
            .pattern_config()
            .unwrap();
        assert_eq!(config.pattern, Pattern::Solid);
        assert_eq!(config.background, Argb(0xFF1A_1A2E));
    }

    #[test]
    fn aliases() {
        let cli = parse(&["--grey", "--rv"]).unwrap();
        assert!(cli.gray);
        assert!(cli.reverse);
    }

    #[test]
    fn patterns_are_exclusive() {
        let err = parse(&["--gray", "--mod", "2", "2"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn scale_is_bounded() {
        assert_eq!(parse(&["--scale", "2.5"]).unwrap().scale.get(), 2.5);
        assert_eq!(
            parse(&["--scale", "0.05"]).unwrap_err().kind(),
            ErrorKind::ValueValidation
        );
        assert!(parse(&["--scale", "big"]).is_err());
    }

    #[test]
    fn invalid_color_is_rejected() {
        assert_eq!(
            parse(&["--bg", "#12345"]).unwrap_err().kind(),
            ErrorKind::ValueValidation
        );
    }

    #[test]
    fn bitmap_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"#define g_width 2\n#define g_height 2\nstatic char g_bits[] = { 0x01, 0x02 };\n")
            .unwrap();
        let cli = parse(&["--bitmap", file.path().to_str().unwrap()]).unwrap();
        match cli.pattern_config().unwrap().pattern {
            Pattern::Bitmap(image) => assert_eq!(image.bits(), &[0x01, 0x02]),
            pattern => panic!("unexpected pattern {pattern:?}"),
        }
    }

    #[test]
    fn missing_bitmap_fails() {
        let cli = parse(&["--bitmap", "/nonexistent/pattern.xbm"]).unwrap();
        assert!(cli.pattern_config().is_err());
    }
}
