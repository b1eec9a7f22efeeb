//! Archive format selection and the argument templates for the external
//! tools. All formats are built and listed through the 7-Zip suite except
//! RAR creation, which requires the proprietary `rar` binary.

use std::path::Path;

use clap::ValueEnum;

/// Archive container formats handled by the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ArchiveFormat {
    Zip,
    #[value(name = "7z")]
    SevenZ,
    Rar,
}

impl ArchiveFormat {
    /// Map a file extension to a format. The match is case-insensitive and
    /// looks only at the final extension.
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "zip" => Some(Self::Zip),
            "7z" => Some(Self::SevenZ),
            "rar" => Some(Self::Rar),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::SevenZ => "7z",
            Self::Rar => "rar",
        }
    }
}

impl std::fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Which external binary an invocation targets. The archiver maps this to a
/// configurable program name so tests and exotic installs can substitute
/// their own binaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tool {
    SevenZip,
    Rar,
}

/// One fully built external invocation: the tool plus its argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ToolCommand {
    pub tool: Tool,
    pub args: Vec<String>,
}

/// Arguments for creating an archive at `output` from `items`, which are
/// paths relative to the working directory the command will run in.
///
/// `level` is the 0-9 compression level; RAR only understands 0-5, so the
/// value is clamped to each tool's range.
pub(crate) fn compress_command(
    format: ArchiveFormat,
    level: u32,
    output: &Path,
    password: Option<&str>,
    items: &[String],
) -> ToolCommand {
    let (tool, mut args) = match format {
        ArchiveFormat::Zip => (
            Tool::SevenZip,
            vec![
                "a".to_string(),
                "-tzip".to_string(),
                "-y".to_string(),
                "-bsp1".to_string(),
                format!("-mx={}", level.min(9)),
            ],
        ),
        ArchiveFormat::SevenZ => (
            Tool::SevenZip,
            vec![
                "a".to_string(),
                "-t7z".to_string(),
                "-y".to_string(),
                "-bsp1".to_string(),
                format!("-mx={}", level.min(9)),
            ],
        ),
        ArchiveFormat::Rar => (
            Tool::Rar,
            vec!["a".to_string(), "-y".to_string(), format!("-m{}", level.min(5))],
        ),
    };
    if let Some(password) = password {
        args.push(format!("-p{password}"));
    }
    args.push(output.to_string_lossy().into_owned());
    args.extend(items.iter().cloned());
    ToolCommand { tool, args }
}

/// Arguments for extracting `archive` into `destination` with full paths.
/// An empty `members` slice extracts everything. 7-Zip reads all three
/// supported formats, so extraction never needs the `rar` binary.
pub(crate) fn extract_command(
    archive: &Path,
    destination: &Path,
    password: Option<&str>,
    members: &[String],
) -> ToolCommand {
    let mut args = vec![
        "x".to_string(),
        archive.to_string_lossy().into_owned(),
        format!("-o{}", destination.to_string_lossy()),
        "-y".to_string(),
        "-bsp1".to_string(),
    ];
    if let Some(password) = password {
        args.push(format!("-p{password}"));
    }
    args.extend(members.iter().cloned());
    ToolCommand { tool: Tool::SevenZip, args }
}

/// Arguments for a verbose per-entry listing of `archive`.
///
/// `-slt` switches on the key/value block output the listing parser
/// consumes; `-ba` suppresses the banner and summary so only entry blocks
/// remain.
pub(crate) fn list_command(archive: &Path, password: Option<&str>) -> ToolCommand {
    let mut args = vec![
        "l".to_string(),
        "-slt".to_string(),
        "-ba".to_string(),
        "-y".to_string(),
    ];
    if let Some(password) = password {
        args.push(format!("-p{password}"));
    }
    args.push(archive.to_string_lossy().into_owned());
    ToolCommand { tool: Tool::SevenZip, args }
}
