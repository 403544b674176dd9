//! Fetch-and-unpack: from a source locator to an extracted source tree
//!
//! A locator is either a VCS command run verbatim (`git clone ...`,
//! `svn co ...`, `hg clone ...`, `cvs ...`) or the URL of an archive. Archives
//! are downloaded next to the current directory, extracted, and the directory
//! they produced is found by name.

use command_executor::{shell_escape, RunOptions};
use tracing::{debug, info};

use crate::context::ExecutionContext;
use crate::error::{ProvisionError, Result};

/// Flags keeping tar from choking on extended attributes written by other platforms
const SAFE_TAR: &str = "--pax-option='delete=SCHILY.*,delete=LIBARCHIVE.*'";

/// Archive suffixes in match order, with the extraction they need
const EXTRACTORS: &[(&[&str], Extractor)] = &[
    (&[".tar.gz", ".tgz"], Extractor::TarGzip),
    (&[".tar"], Extractor::Tar),
    (&[".tar.bz2"], Extractor::TarBzip2),
    (&[".zip"], Extractor::Unzip),
];

/// Version control tools a locator may invoke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vcs {
    /// git
    Git,
    /// Subversion
    Svn,
    /// Mercurial
    Hg,
    /// CVS
    Cvs,
}

impl Vcs {
    fn detect(locator: &str) -> Option<Self> {
        [
            ("git", Self::Git),
            ("svn", Self::Svn),
            ("hg", Self::Hg),
            ("cvs", Self::Cvs),
        ]
        .into_iter()
        .find(|(prefix, _)| locator.starts_with(prefix))
        .map(|(_, vcs)| vcs)
    }
}

/// Where source code comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// A checkout command, run as-is
    Vcs {
        /// Which tool the command invokes
        vcs: Vcs,
        /// The full command line
        command: String,
    },
    /// An archive URL
    Archive(String),
}

impl Locator {
    /// Classify a locator string by its leading command name
    pub fn parse(locator: &str) -> Self {
        match Vcs::detect(locator) {
            Some(vcs) => Self::Vcs {
                vcs,
                command: locator.to_string(),
            },
            None => Self::Archive(locator.to_string()),
        }
    }
}

/// How an archive is extracted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extractor {
    /// gzip-compressed tar
    TarGzip,
    /// plain tar
    Tar,
    /// bzip2-compressed tar
    TarBzip2,
    /// zip
    Unzip,
}

impl Extractor {
    /// The shell command, without the archive argument
    pub fn command(&self) -> String {
        match self {
            Self::TarGzip => format!("tar {} -xzpf", SAFE_TAR),
            Self::Tar => format!("tar {} -xpf", SAFE_TAR),
            Self::TarBzip2 => format!("tar {} -xjpf", SAFE_TAR),
            Self::Unzip => "unzip".to_string(),
        }
    }
}

/// What unpacking an archive URL is expected to produce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpackPlan {
    /// File name the archive is saved under
    pub archive_file: String,
    /// Directory the archive is expected to create
    pub dir_name: String,
    /// How to extract it
    pub extractor: Extractor,
}

/// Work out the archive file, expected directory and extractor for `url`
///
/// Query strings are ignored; the suffix match is case-sensitive.
pub fn expected_file(url: &str, dir_name: Option<&str>) -> Result<UnpackPlan> {
    let path = url.split('?').next().unwrap_or(url);
    let archive_file = path.rsplit('/').next().unwrap_or(path);

    for (suffixes, extractor) in EXTRACTORS {
        for suffix in *suffixes {
            if let Some(stem) = archive_file.strip_suffix(suffix) {
                return Ok(UnpackPlan {
                    archive_file: archive_file.to_string(),
                    dir_name: dir_name.unwrap_or(stem).to_string(),
                    extractor: *extractor,
                });
            }
        }
    }
    Err(ProvisionError::NoExtractCommand {
        url: url.to_string(),
    })
}

/// Options for [`fetch_and_unpack`]
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions<'a> {
    /// Revision to check out after cloning (git only)
    pub revision: Option<&'a str>,
    /// Directory the archive creates, when it differs from the file name
    pub dir_name: Option<&'a str>,
    /// Return `None` instead of failing when no directory can be found
    pub optional_dir: bool,
}

/// Fetch `locator` into the context's current directory and return the source directory
pub async fn fetch_and_unpack(
    ctx: &ExecutionContext,
    locator: &str,
    options: FetchOptions<'_>,
) -> Result<Option<String>> {
    match Locator::parse(locator) {
        Locator::Vcs { vcs, command } => checkout(ctx, vcs, &command, options.revision)
            .await
            .map(Some),
        Locator::Archive(url) => {
            let plan = expected_file(&url, options.dir_name)?;
            let router = ctx.router();
            if !router.exists(&plan.archive_file).await? {
                router.run(&download_command(ctx, &plan.archive_file, &url)).await?;
            }
            router
                .run(&format!(
                    "{} {}",
                    plan.extractor.command(),
                    shell_escape(&plan.archive_file)
                ))
                .await?;
            resolve_dir_name(ctx, &plan.dir_name, !options.optional_dir).await
        }
    }
}

fn download_command(ctx: &ExecutionContext, file: &str, url: &str) -> String {
    // Older mirrors serve certificates wget rejects
    let insecure = if ctx.verify_tls() {
        ""
    } else {
        "--no-check-certificate "
    };
    format!(
        "wget {}-O {} {}",
        insecure,
        shell_escape(file),
        shell_escape_always(url)
    )
}

fn shell_escape_always(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\"'\"'"))
}

/// Directory a checkout command creates: the last argument's basename, minus extension
fn checkout_dir(command: &str) -> String {
    let last = command.split_whitespace().last().unwrap_or(command);
    let base = last.trim_end_matches('/').rsplit('/').next().unwrap_or(last);
    match base.rfind('.') {
        Some(dot) if dot > 0 => base[..dot].to_string(),
        _ => base.to_string(),
    }
}

async fn checkout(
    ctx: &ExecutionContext,
    vcs: Vcs,
    command: &str,
    revision: Option<&str>,
) -> Result<String> {
    if revision.is_some() && vcs != Vcs::Git {
        let name = command.split_whitespace().next().unwrap_or(command);
        return Err(ProvisionError::UnsupportedRevision {
            vcs: name.to_string(),
        });
    }

    let base = checkout_dir(command);
    let router = ctx.router();
    if router.exists(&base).await? {
        router
            .sudo(&format!("rm -rf {}", shell_escape(&base)))
            .await?;
    }
    info!("Checking out {}", command);
    router.run(command).await?;

    if let Some(revision) = revision {
        router
            .within(&base)
            .run(&format!("git checkout {}", shell_escape(revision)))
            .await?;
    }
    Ok(base)
}

/// Find the directory an archive actually unpacked into
///
/// Tries `dir_name` as-is and with `-src` or `_core` removed, then globs by
/// the first token, the last token, the part before the first dot and the
/// lowercased part before the first dot. A glob only counts when it matches
/// exactly one directory.
pub async fn resolve_dir_name(
    ctx: &ExecutionContext,
    dir_name: &str,
    need_dir: bool,
) -> Result<Option<String>> {
    let router = ctx.router();
    for strip in ["", "-src", "_core"] {
        let candidate = if strip.is_empty() {
            dir_name.to_string()
        } else {
            dir_name.replace(strip, "")
        };
        if router.exists(&candidate).await? {
            return Ok(Some(candidate));
        }
    }

    let first = dir_name
        .split('-')
        .next()
        .and_then(|part| part.split('_').next())
        .unwrap_or(dir_name);
    let last = dir_name
        .rsplit('-')
        .next()
        .and_then(|part| part.rsplit('_').next())
        .unwrap_or(dir_name);
    let before_dot = dir_name.split('.').next().unwrap_or(dir_name);
    let lowered = dir_name.to_lowercase();
    let lowered_before_dot = lowered.split('.').next().unwrap_or(&lowered).to_string();

    for part in [first, last, before_dot, lowered_before_dot.as_str()] {
        if part.is_empty() {
            continue;
        }
        let listing = router
            .run_with(&format!("ls -d1 *{}*/", part), RunOptions::probe())
            .await?;
        let dirs: Vec<&str> = listing
            .lines()
            .filter(|line| !line.contains("cannot access") && !line.contains("No such"))
            .collect();
        debug!("glob *{}*/ matched {:?}", part, dirs);
        if let [only] = dirs.as_slice() {
            return Ok(Some(only.trim_end_matches('/').to_string()));
        }
    }

    if need_dir {
        Err(ProvisionError::DirectoryNotFound {
            dir_name: dir_name.to_string(),
        })
    } else {
        Ok(None)
    }
}
