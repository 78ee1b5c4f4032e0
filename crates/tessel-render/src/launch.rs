//! Command-line switches read once at device setup.

use crate::caps::DxLevel;

/// Engine launch options.
///
/// Every option defaults to off; a missing flag never fails setup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    /// `-maxdxlevel=N`: clamp the chosen DX level.
    pub max_dx_level: Option<DxLevel>,
    /// `-disallowhwmorph`: remove hardware morph support.
    pub disallow_hw_morph: bool,
    /// `-forceatifetch4`: keep Fetch4 on DX10-class ATI parts.
    pub force_ati_fetch4: bool,
    /// `-noglslcontrolflow`: remove GLSL control flow support.
    pub no_glsl_control_flow: bool,
}

impl LaunchOptions {
    /// Parses engine-style single-dash flags.
    ///
    /// Both `-maxdxlevel=95` and `-maxdxlevel 95` are accepted. Flags are
    /// matched case-insensitively and unknown arguments are ignored.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = Self::default();
        let mut args = args.into_iter().peekable();

        while let Some(arg) = args.next() {
            let arg = arg.as_ref();
            let (flag, inline_value) = match arg.split_once('=') {
                Some((flag, value)) => (flag, Some(value.to_string())),
                None => (arg, None),
            };

            match flag.to_ascii_lowercase().as_str() {
                "-maxdxlevel" => {
                    let value = match inline_value {
                        Some(value) => Some(value),
                        None => args.next().map(|next| next.as_ref().to_string()),
                    };
                    match value.as_deref().map(str::parse::<u16>) {
                        Some(Ok(level)) => options.max_dx_level = Some(DxLevel::new(level)),
                        Some(Err(_)) | None => {
                            tracing::warn!("Ignoring -maxdxlevel with invalid value {:?}", value);
                        }
                    }
                }
                "-disallowhwmorph" => options.disallow_hw_morph = true,
                "-forceatifetch4" => options.force_ati_fetch4 = true,
                "-noglslcontrolflow" => options.no_glsl_control_flow = true,
                _ => {}
            }
        }

        options
    }

    /// Reads options from the process arguments.
    pub fn from_env() -> Self {
        Self::from_args(std::env::args().skip(1))
    }
}

/// Requested device mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShaderDeviceInfo {
    /// DX level to run at; `None` uses the adapter's own level.
    pub dx_level: Option<DxLevel>,
}

impl ShaderDeviceInfo {
    pub fn with_dx_level(level: DxLevel) -> Self {
        Self {
            dx_level: Some(level),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let options = LaunchOptions::from_args(Vec::<String>::new());
        assert_eq!(options, LaunchOptions::default());
    }

    #[test]
    fn test_parse_all_flags() {
        let options = LaunchOptions::from_args([
            "-game",
            "hl2",
            "-maxdxlevel=92",
            "-disallowhwmorph",
            "-ForceAtiFetch4",
            "-noglslcontrolflow",
        ]);
        assert_eq!(options.max_dx_level, Some(DxLevel::DX92));
        assert!(options.disallow_hw_morph);
        assert!(options.force_ati_fetch4);
        assert!(options.no_glsl_control_flow);
    }

    #[test]
    fn test_max_dx_level_separate_value() {
        let options = LaunchOptions::from_args(["-maxdxlevel", "90", "-windowed"]);
        assert_eq!(options.max_dx_level, Some(DxLevel::DX90));
    }

    #[test]
    fn test_invalid_level_ignored() {
        let options = LaunchOptions::from_args(["-maxdxlevel=high"]);
        assert_eq!(options.max_dx_level, None);
        let options = LaunchOptions::from_args(["-maxdxlevel"]);
        assert_eq!(options.max_dx_level, None);
    }
}
