//! Prompt resolution from inline values, files, standard input and positional
//! arguments.
//!
//! Sources are consulted in a fixed order and the first one holding a value
//! wins; the rest are never touched. Every resolved prompt is sanitized and
//! checked against the prompt ceiling before it leaves this module.

use std::fs::File;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use tracing::debug;

use crate::diagnostics::{DiagnosticSink, Subject, Warning};
use crate::limits::LimitPolicy;
use crate::text::Utf8Decoder;
use crate::{Error, Limits};

/// File path value that stands for standard input.
pub const STDIN_MARKER: &str = "-";

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Which of the two prompts is being resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    System,
    User,
}

impl PromptRole {
    fn subject(self) -> Subject {
        match self {
            PromptRole::System => Subject::SystemPrompt,
            PromptRole::User => Subject::UserPrompt,
        }
    }
}

/// The candidate sources for one prompt, as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptSources {
    pub inline: Option<String>,
    pub file: Option<PathBuf>,
    pub positional: Option<String>,
}

impl PromptSources {
    pub fn inline(text: impl Into<String>) -> Self {
        Self {
            inline: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    pub fn with_positional(mut self, text: impl Into<String>) -> Self {
        self.positional = Some(text.into());
        self
    }

    /// Pick the winning source for `role`.
    ///
    /// Order: inline value, file path (`-` meaning stdin), positional argument
    /// (user prompt only), piped stdin (user prompt only). Returns `None` when
    /// nothing applies.
    pub fn select(
        &self,
        role: PromptRole,
        stdin_piped: bool,
    ) -> Result<Option<PromptSource>, Error> {
        if let Some(text) = self.inline.as_ref().filter(|text| !text.is_empty()) {
            return Ok(Some(PromptSource::Inline(text.clone())));
        }

        if let Some(path) = self.file.as_ref().filter(|path| !path.as_os_str().is_empty()) {
            if path.as_os_str() == STDIN_MARKER {
                return match role {
                    PromptRole::User => Ok(Some(PromptSource::Stdin)),
                    PromptRole::System => Err(Error::prompt_source(
                        "the system prompt cannot be read from standard input ('-' is reserved for the user prompt)",
                    )),
                };
            }
            return Ok(Some(PromptSource::File(path.clone())));
        }

        if role == PromptRole::User {
            if let Some(text) = self.positional.as_ref().filter(|text| !text.is_empty()) {
                return Ok(Some(PromptSource::Positional(text.clone())));
            }
            if stdin_piped {
                return Ok(Some(PromptSource::Stdin));
            }
        }

        Ok(None)
    }
}

/// The one source a prompt was taken from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptSource {
    Inline(String),
    File(PathBuf),
    Stdin,
    Positional(String),
}

impl PromptSource {
    fn label(&self) -> &'static str {
        match self {
            PromptSource::Inline(_) => "inline",
            PromptSource::File(_) => "file",
            PromptSource::Stdin => "stdin",
            PromptSource::Positional(_) => "positional",
        }
    }
}

/// Standard input together with whether it is attached to a terminal.
pub struct Stdin<R> {
    reader: R,
    interactive: bool,
    consumed: bool,
}

impl Stdin<io::Stdin> {
    /// The process's standard input.
    pub fn process() -> Self {
        let stdin = io::stdin();
        let interactive = stdin.is_terminal();
        Self {
            reader: stdin,
            interactive,
            consumed: false,
        }
    }
}

impl<R: Read> Stdin<R> {
    /// Input piped in from another process or file.
    pub fn piped(reader: R) -> Self {
        Self {
            reader,
            interactive: false,
            consumed: false,
        }
    }

    /// Input attached to a terminal; never read implicitly.
    pub fn interactive(reader: R) -> Self {
        Self {
            reader,
            interactive: true,
            consumed: false,
        }
    }

    /// Whether implicit reading is allowed.
    pub fn is_piped(&self) -> bool {
        !self.interactive && !self.consumed
    }

    fn read_bounded(&mut self, policy: &LimitPolicy) -> Result<(String, usize), Error> {
        if self.consumed {
            return Err(Error::prompt_source(
                "standard input has already been consumed",
            ));
        }
        self.consumed = true;
        read_bounded(&mut self.reader, policy, "standard input")
    }
}

/// System and user prompt after resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedPrompts {
    pub system: String,
    pub user: String,
}

/// Resolves prompts against one stdin handle and one set of limits.
pub struct PromptResolver<'a, R> {
    stdin: Stdin<R>,
    policy: LimitPolicy,
    diagnostics: &'a dyn DiagnosticSink,
}

impl<'a, R: Read> PromptResolver<'a, R> {
    pub fn new(stdin: Stdin<R>, limits: &Limits, diagnostics: &'a dyn DiagnosticSink) -> Self {
        Self {
            stdin,
            policy: limits.input_policy(),
            diagnostics,
        }
    }

    /// Resolve one prompt. An empty string means no source applied.
    pub fn resolve(&mut self, role: PromptRole, sources: &PromptSources) -> Result<String, Error> {
        let Some(source) = sources.select(role, self.stdin.is_piped())? else {
            return Ok(String::new());
        };
        debug!(?role, source = source.label(), "resolving prompt");

        let subject = role.subject();
        match source {
            PromptSource::Inline(text) | PromptSource::Positional(text) => {
                self.finish((text, 0), subject)
            }
            PromptSource::File(path) => {
                let what = format!("prompt file {}", path.display());
                let file = File::open(&path).map_err(|e| Error::io(what.as_str(), e))?;
                let decoded = read_bounded(file, &self.policy, &what)?;
                self.finish(decoded, subject)
            }
            PromptSource::Stdin => {
                let decoded = self.stdin.read_bounded(&self.policy)?;
                self.finish(decoded, subject)
            }
        }
    }

    /// Resolve the system prompt, then the user prompt, which must not be empty.
    pub fn resolve_pair(
        &mut self,
        system: &PromptSources,
        user: &PromptSources,
    ) -> Result<ResolvedPrompts, Error> {
        let system = self.resolve(PromptRole::System, system)?;
        let user = self.resolve(PromptRole::User, user)?;
        if user.is_empty() {
            return Err(Error::prompt_source(
                "no user prompt provided; pass it inline, from a file, as an argument, or pipe it to stdin",
            ));
        }
        Ok(ResolvedPrompts { system, user })
    }

    fn finish(&self, (text, replacements): (String, usize), subject: Subject) -> Result<String, Error> {
        if replacements > 0 {
            self.diagnostics.warn(Warning::InvalidUtf8 {
                subject,
                replacements,
            });
        }
        self.policy.enforce(text, subject, self.diagnostics)
    }
}

/// Read `reader` to the end, sanitizing as it goes and checking the size of
/// the sanitized text after every read.
///
/// Under `stop` the read fails as soon as that size passes the ceiling. Under
/// `warn` reading ends there and the final cut is left to the policy. Returns
/// the text and its replacement count.
fn read_bounded<R: Read>(
    mut reader: R,
    policy: &LimitPolicy,
    what: &str,
) -> Result<(String, usize), Error> {
    let mut decoder = Utf8Decoder::new();
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];

    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::io(what, e)),
        };

        decoder.push(&chunk[..n]);
        let size = decoder.len() as u64;
        let decision = policy.check(0, size);
        if decision.must_stop {
            return Err(policy.exceeded(size));
        }
        if decision.exceeded {
            debug!(what, limit = policy.ceiling, "stopped reading at the prompt size limit");
            break;
        }
    }

    Ok(decoder.finish())
}
