// guards.rs — Option and content guards for whitelisted commands.
//
// A whitelisted tool can still write in a read-only zone (`sed -i`,
// `sort -o`) or run another program (`rg --pre`, `tar --to-command`,
// awk's `system()`). Guards close those doors per command. `Always` guards
// apply in every zone; `ReadOnly` guards apply where the zone cannot write.

use regex::Regex;

use crate::error::PolicyError;
use crate::schema::{is_option, option_present, Classified};

/// Where a guard applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardScope {
    Always,
    ReadOnly,
}

/// Declarative form of a guard rule, as written in the table below.
#[derive(Debug, Clone, Copy)]
pub enum RuleSpec {
    /// Short options match inside bundles (`-ni` carries `-i`).
    ForbidOptions(&'static [&'static str]),
    /// Exact tokens (or `token=value`), for single-dash long option styles.
    ForbidWords(&'static [&'static str]),
    /// No argument may match.
    ForbidPattern(&'static str),
    /// No argument that is not a path may match (scripts, filters, SQL).
    ForbidScriptPattern(&'static str),
    /// At least one of these options must be present.
    RequireOption(&'static [&'static str]),
    /// The first positional operand must be one of these.
    FirstOperandIn(&'static [&'static str]),
    MaxOperands(usize),
    NoOperands,
}

#[derive(Debug, Clone, Copy)]
pub struct GuardSpec {
    pub command: &'static str,
    pub scope: GuardScope,
    pub rule: RuleSpec,
    pub reason: &'static str,
}

const fn always(command: &'static str, rule: RuleSpec, reason: &'static str) -> GuardSpec {
    GuardSpec {
        command,
        scope: GuardScope::Always,
        rule,
        reason,
    }
}

const fn read_only(command: &'static str, rule: RuleSpec, reason: &'static str) -> GuardSpec {
    GuardSpec {
        command,
        scope: GuardScope::ReadOnly,
        rule,
        reason,
    }
}

use RuleSpec::*;

const RUNS_PROGRAMS: &str = "option runs another program";
const WRITES_FILES: &str = "option writes files in a read-only zone";
const READS_ARG_FILE: &str = "option reads unchecked file names from a file";

pub const GUARDS: &[GuardSpec] = &[
    // Embedded execution.
    always("awk", ForbidOptions(&["-f", "--file", "-E", "--exec", "-l", "--load", "-i", "--include"]), "awk program files and extensions can run arbitrary code"),
    always("awk", ForbidScriptPattern(r"\bsystem\b|\bgetline\b|>"), "awk program may not run commands or redirect output"),
    always("sed", ForbidOptions(&["-f", "--file"]), "sed script files are not inspected"),
    always("sed", ForbidScriptPattern(r"(?:^|[{}])\s*(?:[0-9]+|/[^/]*/)?(?:,\s*(?:[0-9]+|/[^/]*/))?\s*!?\s*[eEwWrR](?:\s|$)"), "sed script may not execute, read or write files"),
    always("sed", ForbidScriptPattern(r"/[gpiImM0-9]*(?:e[gpiImM0-9]*|w\s+\S.*)$"), "sed substitution may not execute or write files"),
    always("dc", ForbidOptions(&["-f", "--file"]), "dc script files are not inspected"),
    always("dc", ForbidPattern("!"), "dc '!' runs a shell command"),
    always("dc", NoOperands, "dc script files are not inspected"),
    always("rg", ForbidOptions(&["--pre", "--pre-glob"]), RUNS_PROGRAMS),
    always("tar", ForbidOptions(&["--to-command", "--checkpoint-action", "--use-compress-program", "-I", "--info-script", "-F", "--new-volume-script", "--rsh-command", "--rmt-command"]), RUNS_PROGRAMS),
    always("tar", ForbidOptions(&["-T", "--files-from"]), READS_ARG_FILE),
    always("zip", ForbidWords(&["-TT", "--unzip-command"]), RUNS_PROGRAMS),
    always("pandoc", ForbidOptions(&["--filter", "-F", "--lua-filter", "-L", "--pdf-engine", "--pdf-engine-opt", "-d", "--defaults"]), RUNS_PROGRAMS),
    always("pandoc", ForbidScriptPattern(r"(?i)\.lua$"), "custom Lua readers and writers run code"),
    always("env", ForbidOptions(&["-S", "--split-string"]), "env -S re-splits a command line"),
    always("xargs", ForbidOptions(&["-a", "--arg-file"]), READS_ARG_FILE),
    always("find", ForbidWords(&["-files0-from"]), READS_ARG_FILE),
    always("sort", ForbidOptions(&["--files0-from"]), READS_ARG_FILE),
    always("sort", ForbidOptions(&["--compress-program"]), RUNS_PROGRAMS),
    always("wc", ForbidOptions(&["--files0-from"]), READS_ARG_FILE),
    always("du", ForbidOptions(&["--files0-from"]), READS_ARG_FILE),
    always("split", ForbidOptions(&["--filter"]), RUNS_PROGRAMS),
    always("git", ForbidOptions(&["--pathspec-from-file", "--upload-pack", "--receive-pack", "--exec", "-O", "--open-files-in-pager"]), RUNS_PROGRAMS),
    always("exiftool", ForbidWords(&["-@", "-config", "-if"]), "option loads or evaluates Perl code"),
    always("sqlite3", ForbidWords(&["-init"]), "init files are not inspected"),
    always("sqlite3", ForbidScriptPattern(r"(?i)\.(?:shell|system|load|output|once|open|cd|save|backup|restore|read|import|excel|log|trace)\b|load_extension|writefile|readfile|\battach\b|\bedit\s*\(|\bvacuum\s+into\b"), "SQL may not touch other files or run programs"),
    always("ffmpeg", ForbidPattern(r"^[A-Za-z][A-Za-z0-9+.\-]*:|[=:,']\s*(?:/|\.\.)"), "protocols and filter file references can reach outside the zone"),
    always("ffmpeg", ForbidWords(&["-filter_script", "-filter_complex_script"]), "filter scripts are not inspected"),
    always("ffprobe", ForbidPattern(r"^[A-Za-z][A-Za-z0-9+.\-]*:|[=:,']\s*(?:/|\.\.)"), "protocols and filter file references can reach outside the zone"),
    always("magick", ForbidPattern(r"^@|^[A-Za-z0-9]{2,}:"), "coder prefixes and @files can reach outside the zone"),
    always("convert", ForbidPattern(r"^@|^[A-Za-z0-9]{2,}:"), "coder prefixes and @files can reach outside the zone"),
    always("identify", ForbidPattern(r"^@|^[A-Za-z0-9]{2,}:"), "coder prefixes and @files can reach outside the zone"),
    always("magick", ForbidWords(&["-script", "-process"]), RUNS_PROGRAMS),
    always("convert", ForbidWords(&["-script", "-process"]), RUNS_PROGRAMS),
    always("rename", ForbidScriptPattern(r"\b(?:system|exec|qx|open|eval|require|unlink|kill|fork|do|use)\b"), "rename expressions may not run Perl code"),
    always("less", ForbidPattern(r"^\+"), "less start-up commands are not allowed"),
    always("more", ForbidPattern(r"^\+"), "more start-up commands are not allowed"),
    always("yq", ForbidScriptPattern(r"\bload[a-z_]*\s*\(|\benv\s*\("), "yq may not load other files or read the environment"),
    always("jq", ForbidScriptPattern(r"\b(?:import|include)\b"), "jq modules are not allowed"),
    always("xmllint", ForbidOptions(&["--noent", "--xinclude", "--loaddtd", "--dtdattr", "--valid", "--postvalid", "--catalogs"]), "external entities can reach outside the zone"),
    // Read-only zones.
    read_only("sed", ForbidOptions(&["-i", "--in-place"]), WRITES_FILES),
    read_only("sort", ForbidOptions(&["-o", "--output"]), WRITES_FILES),
    read_only("shuf", ForbidOptions(&["-o", "--output"]), WRITES_FILES),
    read_only("iconv", ForbidOptions(&["-o", "--output"]), WRITES_FILES),
    read_only("yq", ForbidOptions(&["-i", "--inplace"]), WRITES_FILES),
    read_only("tree", ForbidOptions(&["-o"]), WRITES_FILES),
    read_only("file", ForbidOptions(&["-C", "--compile"]), WRITES_FILES),
    read_only("xmllint", ForbidOptions(&["--output", "-o"]), WRITES_FILES),
    read_only("find", ForbidWords(&["-delete", "-fprint", "-fprint0", "-fprintf", "-fls"]), WRITES_FILES),
    read_only("uniq", MaxOperands(1), "a second operand is an output file"),
    read_only("xxd", MaxOperands(1), "a second operand is an output file"),
    read_only("tar", RequireOption(&["-t", "--list"]), "only listing archives is allowed in a read-only zone"),
    read_only("tar", ForbidOptions(&["-x", "--extract", "--get", "-c", "--create", "-r", "--append", "-u", "--update", "--delete", "-A", "--catenate", "--concatenate"]), WRITES_FILES),
    read_only("unzip", RequireOption(&["-l", "-v", "-Z", "-t", "-p", "-c", "-z"]), "only listing or testing archives is allowed in a read-only zone"),
    read_only("7z", FirstOperandIn(&["l", "t", "h"]), "only listing or testing archives is allowed in a read-only zone"),
    read_only("sqlite3", RequireOption(&["-readonly"]), "databases must be opened with -readonly in a read-only zone"),
    read_only("exiftool", ForbidWords(&["-o", "-out", "-w", "-W", "-tagsFromFile", "-TagsFromFile", "-geotag", "-overwrite_original", "-delete_original", "-srcfile"]), WRITES_FILES),
    read_only("exiftool", ForbidPattern(r"^-[^=]*="), "tag assignments write files in a read-only zone"),
];

#[derive(Debug)]
enum Rule {
    ForbidOptions(&'static [&'static str]),
    ForbidWords(&'static [&'static str]),
    ForbidPattern(Regex),
    ForbidScriptPattern(Regex),
    RequireOption(&'static [&'static str]),
    FirstOperandIn(&'static [&'static str]),
    MaxOperands(usize),
    NoOperands,
}

/// A compiled guard, ready to check an argument list.
#[derive(Debug)]
pub struct Guard {
    pub scope: GuardScope,
    pub reason: &'static str,
    rule: Rule,
}

impl Guard {
    pub fn compile(spec: &GuardSpec) -> Result<Self, PolicyError> {
        let regex = |pattern: &'static str| {
            Regex::new(pattern).map_err(|e| PolicyError::InvalidPattern {
                command: spec.command.to_string(),
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
        };
        let rule = match spec.rule {
            RuleSpec::ForbidOptions(o) => Rule::ForbidOptions(o),
            RuleSpec::ForbidWords(w) => Rule::ForbidWords(w),
            RuleSpec::ForbidPattern(p) => Rule::ForbidPattern(regex(p)?),
            RuleSpec::ForbidScriptPattern(p) => Rule::ForbidScriptPattern(regex(p)?),
            RuleSpec::RequireOption(o) => Rule::RequireOption(o),
            RuleSpec::FirstOperandIn(v) => Rule::FirstOperandIn(v),
            RuleSpec::MaxOperands(n) => Rule::MaxOperands(n),
            RuleSpec::NoOperands => Rule::NoOperands,
        };
        Ok(Self {
            scope: spec.scope,
            reason: spec.reason,
            rule,
        })
    }

    /// The offending argument, or `None` when the arguments pass.
    pub fn violation(&self, args: &[String], classified: &Classified<'_>) -> Option<String> {
        match &self.rule {
            Rule::ForbidOptions(options) => args
                .iter()
                .filter(|a| is_option(a))
                .find(|a| options.iter().any(|o| option_present(a, o)))
                .cloned(),
            Rule::ForbidWords(words) => args
                .iter()
                .find(|a| {
                    words.iter().any(|w| {
                        a.as_str() == *w
                            || (a.starts_with(w) && a[w.len()..].starts_with('='))
                    })
                })
                .cloned(),
            Rule::ForbidPattern(re) => args.iter().find(|a| re.is_match(a)).cloned(),
            Rule::ForbidScriptPattern(re) => args
                .iter()
                .filter(|a| !classified.paths.contains(&a.as_str()))
                .find(|a| re.is_match(a))
                .cloned(),
            Rule::RequireOption(options) => {
                let present = args
                    .iter()
                    .filter(|a| is_option(a))
                    .any(|a| options.iter().any(|o| option_present(a, o)));
                (!present).then(|| format!("(missing one of {})", options.join(", ")))
            }
            Rule::FirstOperandIn(allowed) => match classified.operands.first() {
                Some(first) if allowed.contains(first) => None,
                Some(first) => Some(first.to_string()),
                None => Some("(missing operand)".to_string()),
            },
            Rule::MaxOperands(max) => classified.operands.get(*max).map(|a| a.to_string()),
            Rule::NoOperands => classified.operands.first().map(|a| a.to_string()),
        }
    }
}
