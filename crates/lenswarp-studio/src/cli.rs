use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use lenswarp_engine::coords::Resolution;
use lenswarp_engine::distortion::{ChromaMode, Eye, ProfileFit};

#[derive(Parser, Debug)]
#[command(name = "lenswarp-studio")]
#[command(about = "Generate and preview HMD lens-distortion correction data")]
#[command(version)]
pub struct Cli {
    /// HMD profile as JSON. Defaults to the Rift DK1.
    #[arg(long, global = true)]
    pub profile: Option<PathBuf>,

    /// Use the profile's K coefficients as-is instead of fitting the outer edge.
    #[arg(long, global = true)]
    pub raw_k: bool,

    /// Fit K so this left-eye viewport point, `X,Y` in screen units, maps onto
    /// itself instead of the outer edge, e.g. "0.6,0".
    #[arg(
        long,
        global = true,
        value_parser = parse_fit_point,
        conflicts_with = "raw_k",
        allow_hyphen_values = true
    )]
    pub fit_point: Option<(f64, f64)>,

    /// Log filter in env_logger syntax, e.g. "debug" or "lenswarp_engine=debug".
    #[arg(long, global = true)]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn fit(&self) -> ProfileFit {
        match (self.raw_k, self.fit_point) {
            (true, _) => ProfileFit::Raw,
            (false, Some((x, y))) => ProfileFit::Point { x, y },
            (false, None) => ProfileFit::FitOuterEdge,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a lookup texture and print statistics.
    Lookup {
        #[command(flatten)]
        target: Target,

        /// Write the achromatic plane as an RG visualization.
        #[arg(long)]
        png: Option<PathBuf>,
    },

    /// Generate a distortion mesh and print its size and displacement.
    Mesh {
        /// Vertex grid, e.g. 64x64.
        #[arg(long, default_value = "64x64", value_parser = parse_resolution)]
        grid: Resolution,

        #[arg(long, value_enum, default_value_t = EyeArg::Left)]
        eye: EyeArg,

        #[arg(long)]
        chroma: bool,

        /// Dump vertices and indices as JSON.
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Warp a checkerboard through both eyes' lookup tables into a
    /// side-by-side PNG.
    Preview {
        /// Per-eye size.
        #[arg(long, default_value = "640x800", value_parser = parse_resolution)]
        size: Resolution,

        #[arg(long)]
        chroma: bool,

        /// Checkerboard square size in pixels.
        #[arg(long, default_value_t = 40)]
        square: u32,

        #[arg(long, default_value = "preview.png")]
        out: PathBuf,
    },

    /// Run both warp passes on a headless GPU and compare with the CPU warp.
    GpuCheck {
        /// Per-eye size.
        #[arg(long, default_value = "320x400", value_parser = parse_resolution)]
        size: Resolution,

        #[arg(long, default_value = "48x48", value_parser = parse_resolution)]
        grid: Resolution,

        #[arg(long)]
        chroma: bool,

        /// Accept a software adapter.
        #[arg(long)]
        fallback: bool,

        /// Write the GPU mesh-pass output.
        #[arg(long)]
        png: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
pub struct Target {
    /// Lookup resolution, e.g. 640x800.
    #[arg(long, default_value = "640x800", value_parser = parse_resolution)]
    pub size: Resolution,

    #[arg(long, value_enum, default_value_t = EyeArg::Left)]
    pub eye: EyeArg,

    #[arg(long)]
    pub chroma: bool,
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum EyeArg {
    Left,
    Right,
}

impl From<EyeArg> for Eye {
    fn from(eye: EyeArg) -> Self {
        match eye {
            EyeArg::Left => Eye::Left,
            EyeArg::Right => Eye::Right,
        }
    }
}

pub fn chroma_mode(chroma: bool) -> ChromaMode {
    if chroma { ChromaMode::Chromatic } else { ChromaMode::Achromatic }
}

/// Parses `WIDTHxHEIGHT`.
pub fn parse_resolution(s: &str) -> Result<Resolution, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<u32>()
            .map_err(|e| format!("invalid dimension {v:?}: {e}"))
    };
    Ok(Resolution::new(parse(w)?, parse(h)?))
}

/// Parses `X,Y`.
pub fn parse_fit_point(s: &str) -> Result<(f64, f64), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got {s:?}"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid coordinate {v:?}: {e}"))
    };
    Ok((parse(x)?, parse(y)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_resolution() {
        assert_eq!(parse_resolution("640x800"), Ok(Resolution::new(640, 800)));
        assert_eq!(parse_resolution("16X9"), Ok(Resolution::new(16, 9)));
        assert!(parse_resolution("640").is_err());
        assert!(parse_resolution("ax3").is_err());
    }

    #[test]
    fn lookup_defaults() {
        let cli = Cli::try_parse_from(["lenswarp-studio", "lookup"]).unwrap();
        assert!(cli.profile.is_none());
        assert_eq!(cli.fit(), ProfileFit::FitOuterEdge);
        let Command::Lookup { target, png } = cli.command else { panic!("wrong command") };
        assert_eq!(target.size, Resolution::new(640, 800));
        assert_eq!(target.eye, EyeArg::Left);
        assert!(!target.chroma);
        assert!(png.is_none());
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::try_parse_from([
            "lenswarp-studio",
            "mesh",
            "--grid",
            "8x4",
            "--eye",
            "right",
            "--chroma",
            "--raw-k",
            "--profile",
            "hmd.json",
        ])
        .unwrap();
        assert_eq!(cli.fit(), ProfileFit::Raw);
        assert_eq!(cli.profile.as_deref(), Some(std::path::Path::new("hmd.json")));
        let Command::Mesh { grid, eye, chroma, .. } = cli.command else { panic!("wrong command") };
        assert_eq!(grid, Resolution::new(8, 4));
        assert_eq!(Eye::from(eye), Eye::Right);
        assert_eq!(chroma_mode(chroma), ChromaMode::Chromatic);
    }

    #[test]
    fn fit_point_selects_point_fit() {
        let cli =
            Cli::try_parse_from(["lenswarp-studio", "preview", "--fit-point", "-0.5, 0.25"])
                .unwrap();
        assert_eq!(cli.fit(), ProfileFit::Point { x: -0.5, y: 0.25 });
        assert!(parse_fit_point("0.6").is_err());
        assert!(parse_fit_point("a,0").is_err());
        assert!(
            Cli::try_parse_from(["lenswarp-studio", "lookup", "--raw-k", "--fit-point", "0,0"])
                .is_err()
        );
    }

    #[test]
    fn rejects_bad_grid() {
        assert!(Cli::try_parse_from(["lenswarp-studio", "mesh", "--grid", "big"]).is_err());
    }

    #[test]
    fn gpu_check_parses() {
        let cli =
            Cli::try_parse_from(["lenswarp-studio", "gpu-check", "--fallback", "--log", "debug"])
                .unwrap();
        assert_eq!(cli.log.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Command::GpuCheck { fallback: true, .. }));
    }
}
