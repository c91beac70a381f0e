// schema.rs — Per-command argument schemas.
//
// Path validation only works if we know which arguments name files. A schema
// tells the classifier which leading operands are scripts or patterns, which
// options consume a value, which consume a path, and whether the command
// wraps another command (timeout, env, xargs, find -exec).
//
// Commands without a schema fall back to a heuristic: every positional token
// is a path, and `--option=value` values are paths when they look like one.
// Known gap: attached short-option values (`-a/etc/passwd`) are only checked
// for options a schema lists as path options.

/// How a command nests another command in its argument list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Nesting {
    #[default]
    None,
    /// `wrapper [options] [skipped operands] COMMAND [ARGS...]`
    Wrapper {
        /// Positional operands before the command (timeout's DURATION).
        skip_operands: usize,
        /// Skip `NAME=VALUE` operands before the command (env).
        skip_assignments: bool,
    },
    /// Options that start an embedded command running to `;` or `+` (find).
    ExecOptions(&'static [&'static str]),
}

/// Argument layout of one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArgSchema {
    /// Leading positional operands that are not paths (grep PATTERN, sed SCRIPT).
    pub leading_operands: usize,
    /// Only the first N positional operands after the leading ones are paths;
    /// the rest are text (sqlite3 DB SQL...).
    pub max_path_operands: Option<usize>,
    /// No positional operand is a path (echo, expr, seq).
    pub text_operands: bool,
    /// Options that supply the leading operand instead (grep -e, sed -e).
    /// Their value is a path when the option is also listed in `path_options`.
    pub operand_options: &'static [&'static str],
    /// Options taking a non-path value.
    pub value_options: &'static [&'static str],
    /// Options taking a path value.
    pub path_options: &'static [&'static str],
    /// Options taking two non-path values (jq --arg NAME VALUE).
    pub pair_options: &'static [&'static str],
    /// Options taking a name followed by a path (jq --rawfile NAME FILE).
    pub pair_path_options: &'static [&'static str],
    pub nesting: Nesting,
}

/// A command found inside another command's arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NestedCommand<'a> {
    pub command: &'a str,
    pub args: &'a [String],
}

/// Result of splitting an argument list according to a schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classified<'a> {
    /// Tokens that name files and must stay inside the zone.
    pub paths: Vec<&'a str>,
    /// Positional operands of this command (nested commands excluded).
    pub operands: Vec<&'a str>,
    pub nested: Vec<NestedCommand<'a>>,
}

impl ArgSchema {
    /// Split `args` into paths, operands and nested commands.
    pub fn classify<'a>(&self, args: &'a [String]) -> Classified<'a> {
        let mut out = Classified::default();
        let mut leading_left = self.leading_operands;
        let mut path_operands_seen = 0usize;
        let mut wrapper_skipped = 0usize;
        let mut options_done = false;
        let mut i = 0;

        while i < args.len() {
            let arg = args[i].as_str();

            if !options_done && arg == "--" {
                options_done = true;
                i += 1;
                continue;
            }

            if !options_done && is_option(arg) {
                if let Nesting::ExecOptions(starts) = self.nesting {
                    if starts.contains(&arg) {
                        let end = args[i + 1..]
                            .iter()
                            .position(|a| a == ";" || a == "+")
                            .map(|p| i + 1 + p)
                            .unwrap_or(args.len());
                        if i + 1 < end {
                            out.nested.push(NestedCommand {
                                command: args[i + 1].as_str(),
                                args: &args[i + 2..end],
                            });
                        }
                        i = end + 1;
                        continue;
                    }
                }
                i += self.classify_option(
                    arg,
                    args.get(i + 1),
                    args.get(i + 2),
                    &mut out,
                    &mut leading_left,
                );
                continue;
            }

            // Positional operand.
            if let Nesting::Wrapper {
                skip_operands,
                skip_assignments,
            } = self.nesting
            {
                if wrapper_skipped < skip_operands {
                    wrapper_skipped += 1;
                    out.operands.push(arg);
                    i += 1;
                    continue;
                }
                if skip_assignments && arg.contains('=') {
                    out.operands.push(arg);
                    i += 1;
                    continue;
                }
                out.nested.push(NestedCommand {
                    command: arg,
                    args: &args[i + 1..],
                });
                break;
            }

            out.operands.push(arg);
            if leading_left > 0 {
                leading_left -= 1;
            } else if !self.text_operands
                && self.max_path_operands.map_or(true, |max| path_operands_seen < max)
            {
                path_operands_seen += 1;
                out.paths.push(arg);
            }
            i += 1;
        }
        out
    }

    /// Classify one option token; returns how many tokens it consumed.
    fn classify_option<'a>(
        &self,
        arg: &'a str,
        next: Option<&'a String>,
        after_next: Option<&'a String>,
        out: &mut Classified<'a>,
        leading_left: &mut usize,
    ) -> usize {
        let (name, inline) = match arg.split_once('=') {
            Some((n, v)) if arg.starts_with("--") => (n, Some(v)),
            _ => (arg, None),
        };

        let is_path = self.path_options.contains(&name);
        let takes_value = is_path
            || self.operand_options.contains(&name)
            || self.value_options.contains(&name);

        if self.operand_options.contains(&name) {
            *leading_left = 0;
        }

        if takes_value {
            return match (inline, next) {
                (Some(v), _) => {
                    if is_path {
                        out.paths.push(v);
                    }
                    1
                }
                (None, Some(v)) => {
                    if is_path {
                        out.paths.push(v.as_str());
                    }
                    2
                }
                (None, None) => 1,
            };
        }

        if self.pair_options.contains(&name) {
            return 1 + next.is_some() as usize + after_next.is_some() as usize;
        }
        if self.pair_path_options.contains(&name) {
            if let Some(path) = after_next {
                out.paths.push(path.as_str());
                return 3;
            }
            return 1 + next.is_some() as usize;
        }

        // Attached value of a short path option: -o/some/file, -C../dir.
        if !arg.starts_with("--") {
            if let Some(short) = self
                .path_options
                .iter()
                .find(|o| is_short(o) && arg.len() > 2 && arg.starts_with(*o))
            {
                out.paths.push(&arg[short.len()..]);
                return 1;
            }
        }

        if let Some(value) = inline {
            if looks_like_path(value) {
                out.paths.push(value);
            }
        }
        1
    }
}

/// Whether a token is an option rather than an operand. A lone `-` is stdin.
pub fn is_option(arg: &str) -> bool {
    arg.len() > 1 && arg.starts_with('-')
}

fn is_short(option: &str) -> bool {
    option.len() == 2 && option.starts_with('-') && !option.starts_with("--")
}

/// Whether an option token carries `option`, either exactly, as `--long=value`,
/// or, for single-letter options, inside a bundle such as `-ni`.
pub fn option_present(arg: &str, option: &str) -> bool {
    if arg == option {
        return true;
    }
    if option.starts_with("--") {
        return arg.starts_with(option) && arg[option.len()..].starts_with('=');
    }
    if is_short(option) && option.as_bytes()[1].is_ascii_alphanumeric() {
        if arg.starts_with("--") || !arg.starts_with('-') {
            return false;
        }
        let letter = &option[1..];
        return arg[1..].contains(letter);
    }
    // Single-dash long option (find -delete, sqlite3 -readonly).
    arg.starts_with(option) && arg[option.len()..].starts_with('=')
}

/// Heuristic for option values of commands without a schema.
pub fn looks_like_path(value: &str) -> bool {
    value.contains('/') || value.contains('\\') || value.starts_with('~') || value.starts_with("..")
}

/// Schema for `command`, or `None` to use the heuristic fallback.
pub fn schema_for(command: &str) -> Option<ArgSchema> {
    let base = ArgSchema::default();
    let schema = match command {
        "echo" | "printf" | "expr" | "factor" | "numfmt" | "seq" | "basename" | "dirname"
        | "cal" | "yes" | "sleep" | "true" | "false" | "uname" | "nproc" | "printenv" | "pwd"
        | "which" | "whereis" | "locate" | "gettext" | "envsubst" | "tr" => ArgSchema {
            text_operands: true,
            ..base
        },
        "date" => ArgSchema {
            text_operands: true,
            value_options: &["-d", "--date", "-I", "--iso-8601", "--rfc-3339"],
            path_options: &["-f", "--file", "-r", "--reference"],
            ..base
        },
        "dc" => ArgSchema {
            operand_options: &["-e", "--expression"],
            path_options: &["-f", "--file"],
            ..base
        },
        "grep" | "egrep" | "fgrep" => ArgSchema {
            leading_operands: 1,
            operand_options: &["-e", "--regexp", "-f", "--file"],
            path_options: &["-f", "--file", "--exclude-from"],
            value_options: &[
                "-m", "--max-count", "-A", "--after-context", "-B", "--before-context", "-C",
                "--context", "--color", "--colour", "--label", "--include", "--exclude",
                "--exclude-dir", "-d", "--directories", "-D", "--devices",
            ],
            ..base
        },
        "rg" => ArgSchema {
            leading_operands: 1,
            operand_options: &["-e", "--regexp", "-f", "--file"],
            path_options: &["-f", "--file", "--ignore-file"],
            value_options: &[
                "-g", "--glob", "--iglob", "-t", "--type", "-T", "--type-not", "-m",
                "--max-count", "-A", "--after-context", "-B", "--before-context", "-C",
                "--context", "-r", "--replace", "-M", "--max-columns", "-d", "--max-depth",
                "-j", "--threads", "--sort", "--sortr", "--color", "--colors", "-E",
                "--encoding", "--max-filesize", "--type-add",
            ],
            ..base
        },
        "sed" => ArgSchema {
            leading_operands: 1,
            operand_options: &["-e", "--expression", "-f", "--file"],
            path_options: &["-f", "--file"],
            value_options: &["-l", "--line-length"],
            ..base
        },
        "awk" => ArgSchema {
            leading_operands: 1,
            operand_options: &["-f", "--file"],
            path_options: &["-f", "--file"],
            value_options: &["-F", "--field-separator", "-v", "--assign"],
            ..base
        },
        "jq" => ArgSchema {
            leading_operands: 1,
            operand_options: &["--from-file"],
            path_options: &["--from-file", "-L"],
            value_options: &["--indent", "--args", "--jsonargs"],
            pair_options: &["--arg", "--argjson"],
            pair_path_options: &["--slurpfile", "--rawfile"],
            ..base
        },
        "yq" => ArgSchema {
            leading_operands: 1,
            value_options: &[
                "-o", "--output-format", "-p", "--input-format", "-I", "--indent",
            ],
            ..base
        },
        "find" => ArgSchema {
            value_options: &[
                "-name", "-iname", "-path", "-ipath", "-wholename", "-iwholename", "-regex",
                "-iregex", "-regextype", "-type", "-xtype", "-size", "-mtime", "-mmin",
                "-atime", "-amin", "-ctime", "-cmin", "-maxdepth", "-mindepth", "-perm",
                "-user", "-group", "-uid", "-gid", "-links", "-inum", "-printf", "-fstype",
                "-lname", "-ilname", "-used",
            ],
            path_options: &[
                "-newer", "-anewer", "-cnewer", "-samefile", "-fprint", "-fprint0", "-fls",
            ],
            nesting: Nesting::ExecOptions(&["-exec", "-execdir", "-ok", "-okdir"]),
            ..base
        },
        "timeout" => ArgSchema {
            value_options: &["-s", "--signal", "-k", "--kill-after"],
            nesting: Nesting::Wrapper {
                skip_operands: 1,
                skip_assignments: false,
            },
            ..base
        },
        "env" => ArgSchema {
            value_options: &["-u", "--unset"],
            path_options: &["-C", "--chdir"],
            nesting: Nesting::Wrapper {
                skip_operands: 0,
                skip_assignments: true,
            },
            ..base
        },
        "xargs" => ArgSchema {
            value_options: &[
                "-d", "--delimiter", "-E", "--eof", "-I", "--replace", "-L", "--max-lines",
                "-n", "--max-args", "-P", "--max-procs", "-s", "--max-chars",
                "--process-slot-var",
            ],
            path_options: &["-a", "--arg-file"],
            nesting: Nesting::Wrapper {
                skip_operands: 0,
                skip_assignments: false,
            },
            ..base
        },
        "head" | "tail" => ArgSchema {
            value_options: &["-n", "--lines", "-c", "--bytes", "-s", "--sleep-interval", "--pid"],
            ..base
        },
        "cut" => ArgSchema {
            value_options: &[
                "-d", "--delimiter", "-f", "--fields", "-b", "--bytes", "-c", "--characters",
                "--output-delimiter",
            ],
            ..base
        },
        "sort" => ArgSchema {
            value_options: &[
                "-k", "--key", "-t", "--field-separator", "-S", "--buffer-size", "--parallel",
                "--batch-size", "--sort",
            ],
            path_options: &["-o", "--output", "-T", "--temporary-directory", "--random-source"],
            ..base
        },
        "shuf" => ArgSchema {
            value_options: &["-n", "--head-count", "-i", "--input-range"],
            path_options: &["-o", "--output", "--random-source"],
            ..base
        },
        "uniq" => ArgSchema {
            value_options: &[
                "-f", "--skip-fields", "-s", "--skip-chars", "-w", "--check-chars",
            ],
            ..base
        },
        "paste" | "join" | "column" | "tac" | "nl" | "fold" | "fmt" | "pr" | "expand"
        | "unexpand" => ArgSchema {
            value_options: &[
                "-d", "--delimiters", "-t", "-s", "--separator", "-c", "-w", "--width",
                "-o", "-e", "-j", "-1", "-2", "-l", "-h", "--header", "-b", "-n", "-v", "-i",
                "-p", "--tabs", "--output-separator", "--table-columns",
            ],
            ..base
        },
        "stat" => ArgSchema {
            value_options: &["-c", "--format", "--printf"],
            ..base
        },
        "ls" => ArgSchema {
            value_options: &[
                "-I", "--ignore", "--hide", "-w", "--width", "--format", "--sort",
                "--time-style", "--color", "-T", "--tabsize", "--block-size",
            ],
            ..base
        },
        "du" => ArgSchema {
            value_options: &[
                "-d", "--max-depth", "--exclude", "-B", "--block-size", "-t", "--threshold",
                "--time-style",
            ],
            path_options: &["-X", "--exclude-from"],
            ..base
        },
        "tree" => ArgSchema {
            value_options: &["-L", "-P", "-I", "--charset", "--filelimit", "--timefmt"],
            path_options: &["-o", "--fromfile"],
            ..base
        },
        "file" => ArgSchema {
            value_options: &["-F", "--separator", "-P", "--parameter", "-e", "--exclude"],
            path_options: &["-m", "--magic-file", "-f", "--files-from"],
            ..base
        },
        "diff" | "sdiff" | "colordiff" => ArgSchema {
            value_options: &[
                "-x", "--exclude", "-I", "--ignore-matching-lines", "-U", "--unified", "-C",
                "--context", "--label", "-W", "--width", "--line-format",
                "--old-line-format", "--new-line-format", "--unchanged-line-format",
            ],
            path_options: &["-X", "--exclude-from", "--from-file", "--to-file", "-o", "--output"],
            ..base
        },
        "od" | "hexdump" | "xxd" | "strings" => ArgSchema {
            value_options: &[
                "-A", "--address-radix", "-t", "--format", "-N", "--read-bytes", "-j",
                "--skip-bytes", "-w", "--width", "-n", "-s", "-c", "-l", "-g", "-o", "-e",
                "--encoding", "--bytes", "--radix",
            ],
            ..base
        },
        "base32" | "base64" | "basenc" => ArgSchema {
            value_options: &["-w", "--wrap"],
            ..base
        },
        "iconv" => ArgSchema {
            value_options: &["-f", "--from-code", "-t", "--to-code"],
            path_options: &["-o", "--output"],
            ..base
        },
        "tar" => ArgSchema {
            value_options: &[
                "--exclude", "--transform", "--xform", "--strip-components", "--owner",
                "--group", "--mode", "--mtime", "--format", "-b", "--blocking-factor",
            ],
            path_options: &[
                "-f", "--file", "-C", "--directory", "-T", "--files-from", "-X",
                "--exclude-from", "-g", "--listed-incremental",
            ],
            ..base
        },
        "unzip" => ArgSchema {
            value_options: &["-x", "-P"],
            path_options: &["-d"],
            ..base
        },
        "zip" => ArgSchema {
            value_options: &["-P", "--password", "-n", "--suffixes", "-t", "-tt", "-x", "-i", "-Z"],
            path_options: &["-b", "--temp-path", "-O", "--output-file"],
            ..base
        },
        "7z" | "7za" => ArgSchema {
            leading_operands: 1,
            path_options: &["-o", "-w"],
            ..base
        },
        "gzip" | "gunzip" | "bzip2" | "bunzip2" | "xz" | "unxz" | "lz4" | "zstd" => ArgSchema {
            value_options: &["-S", "--suffix", "-T", "--threads", "-b", "-B"],
            path_options: &["-o", "--output"],
            ..base
        },
        "split" => ArgSchema {
            value_options: &[
                "-a", "--suffix-length", "-b", "--bytes", "-C", "--line-bytes", "-l",
                "--lines", "-n", "--number", "-t", "--separator", "--additional-suffix",
            ],
            max_path_operands: Some(2),
            ..base
        },
        "csplit" => ArgSchema {
            value_options: &["-b", "--suffix-format", "-n", "--digits"],
            path_options: &["-f", "--prefix"],
            max_path_operands: Some(1),
            ..base
        },
        "patch" => ArgSchema {
            value_options: &["-p", "--strip", "-F", "--fuzz", "-V", "--version-control", "-z", "--suffix"],
            path_options: &[
                "-i", "--input", "-o", "--output", "-d", "--directory", "-r", "--reject-file",
                "-B", "--prefix",
            ],
            ..base
        },
        "cp" | "mv" | "ln" | "install" => ArgSchema {
            value_options: &["-S", "--suffix", "-m", "--mode", "-o", "--owner", "-g", "--group", "--backup"],
            path_options: &["-t", "--target-directory"],
            ..base
        },
        "mkdir" => ArgSchema {
            value_options: &["-m", "--mode"],
            ..base
        },
        "touch" => ArgSchema {
            value_options: &["-d", "--date", "-t"],
            path_options: &["-r", "--reference"],
            ..base
        },
        "truncate" => ArgSchema {
            value_options: &["-s", "--size"],
            path_options: &["-r", "--reference"],
            ..base
        },
        "chmod" => ArgSchema {
            leading_operands: 1,
            operand_options: &["--reference"],
            path_options: &["--reference"],
            ..base
        },
        "shred" => ArgSchema {
            value_options: &["-n", "--iterations", "-s", "--size"],
            path_options: &["--random-source"],
            ..base
        },
        "mktemp" => ArgSchema {
            value_options: &["--suffix"],
            path_options: &["-p", "--tmpdir"],
            ..base
        },
        "rename" => ArgSchema {
            leading_operands: 1,
            ..base
        },
        "pandoc" => ArgSchema {
            value_options: &[
                "-f", "--from", "-r", "--read", "-t", "--to", "-w", "--write", "-M",
                "--metadata", "-V", "--variable", "--toc-depth", "--columns", "--wrap",
                "--pdf-engine", "--highlight-style", "--shift-heading-level-by",
            ],
            path_options: &[
                "-o", "--output", "--template", "--reference-doc", "-c", "--css", "-H",
                "--include-in-header", "-B", "--include-before-body", "-A",
                "--include-after-body", "--resource-path", "--extract-media", "--data-dir",
                "--metadata-file", "--bibliography", "--csl", "-d", "--defaults",
            ],
            ..base
        },
        "ffmpeg" | "ffprobe" => ArgSchema {
            value_options: &[
                "-f", "-c", "-c:v", "-c:a", "-codec", "-codec:v", "-codec:a", "-vcodec",
                "-acodec", "-b:v", "-b:a", "-r", "-s", "-ss", "-t", "-to", "-vf", "-af",
                "-filter:v", "-filter:a", "-filter_complex", "-map", "-ar", "-ac", "-q:v",
                "-q:a", "-crf", "-preset", "-loglevel", "-v", "-threads", "-pix_fmt",
                "-show_entries", "-of", "-print_format", "-select_streams", "-frames:v",
                "-vframes", "-aspect", "-metadata",
            ],
            path_options: &["-i"],
            ..base
        },
        "magick" | "convert" | "identify" => ArgSchema {
            value_options: &[
                "-resize", "-crop", "-rotate", "-quality", "-geometry", "-format",
                "-density", "-colorspace", "-depth", "-type", "-gravity", "-extent",
                "-background", "-fill", "-pointsize", "-thumbnail", "-scale", "-sample",
                "-define",
            ],
            path_options: &["-write"],
            ..base
        },
        "exiftool" => ArgSchema {
            value_options: &["-p", "-d", "-charset", "-lang", "-ext", "-if"],
            path_options: &["-o", "-out", "-w", "-tagsFromFile", "-TagsFromFile"],
            ..base
        },
        "xmllint" => ArgSchema {
            value_options: &["--xpath", "--encode", "--maxmem", "--path"],
            path_options: &["--output", "-o", "--schema", "--relaxng", "--dtdvalid", "--schematron"],
            ..base
        },
        "sqlite3" => ArgSchema {
            value_options: &[
                "-cmd", "-separator", "-newline", "-nullvalue", "-mode",
            ],
            path_options: &["-init"],
            max_path_operands: Some(1),
            ..base
        },
        "git" => ArgSchema {
            leading_operands: 1,
            value_options: &[
                "-m", "--message", "-n", "--max-count", "--author", "--committer", "--since",
                "--until", "--after", "--before", "--format", "--pretty", "--grep", "-S",
                "-G", "-U", "--unified", "--date", "--abbrev", "-L", "--depth",
                "--sort",
            ],
            path_options: &["--output", "-F", "--file", "--contents"],
            ..base
        },
        _ => return None,
    };
    Some(schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn paths_of(command: &str, list: &[&str]) -> Vec<String> {
        let a = args(list);
        let schema = schema_for(command).unwrap_or_default();
        schema
            .classify(&a)
            .paths
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn heuristic_treats_operands_as_paths() {
        assert_eq!(paths_of("cat", &["a.txt", "-n", "b/c.txt"]), vec!["a.txt", "b/c.txt"]);
    }

    #[test]
    fn heuristic_checks_long_option_values_that_look_like_paths() {
        assert_eq!(paths_of("wc", &["--files=../x", "--mode=fast"]), vec!["../x"]);
    }

    #[test]
    fn grep_pattern_is_not_a_path() {
        assert_eq!(paths_of("grep", &["-n", "/etc/passwd", "notes.txt"]), vec!["notes.txt"]);
    }

    #[test]
    fn grep_with_e_has_no_leading_pattern() {
        assert_eq!(
            paths_of("grep", &["-e", "foo", "a.txt", "b.txt"]),
            vec!["a.txt", "b.txt"]
        );
    }

    #[test]
    fn grep_pattern_file_is_a_path() {
        assert_eq!(paths_of("grep", &["-f", "../pats", "a.txt"]), vec!["../pats", "a.txt"]);
    }

    #[test]
    fn cut_delimiter_is_a_value() {
        assert_eq!(paths_of("cut", &["-d", "/", "-f", "1", "list.txt"]), vec!["list.txt"]);
    }

    #[test]
    fn attached_short_path_option_is_checked() {
        assert_eq!(paths_of("sort", &["-o/etc/out", "in.txt"]), vec!["/etc/out", "in.txt"]);
        assert_eq!(paths_of("tar", &["-xf", "a.tar", "-C../up"]), vec!["a.tar", "../up"]);
    }

    #[test]
    fn long_path_option_with_inline_value() {
        assert_eq!(paths_of("tar", &["--directory=/tmp", "-tf", "a.tar"]), vec!["/tmp", "a.tar"]);
    }

    #[test]
    fn text_commands_have_no_paths() {
        assert!(paths_of("echo", &["/etc/passwd", "../x"]).is_empty());
    }

    #[test]
    fn double_dash_ends_options() {
        assert_eq!(paths_of("rm", &["--", "-weird-name"]), vec!["-weird-name"]);
    }

    #[test]
    fn sqlite_only_first_operand_is_a_path() {
        assert_eq!(
            paths_of("sqlite3", &["-readonly", "db.sqlite", "select 1/2"]),
            vec!["db.sqlite"]
        );
    }

    #[test]
    fn jq_pair_options_skip_both_values() {
        assert_eq!(
            paths_of("jq", &["--arg", "k", "/v", ".a", "data.json"]),
            vec!["data.json"]
        );
        assert_eq!(
            paths_of("jq", &["--rawfile", "k", "../secret", ".a", "data.json"]),
            vec!["../secret", "data.json"]
        );
    }

    #[test]
    fn timeout_nests_its_command() {
        let a = args(&["-s", "KILL", "5", "cat", "a.txt"]);
        let c = schema_for("timeout").unwrap().classify(&a);
        assert!(c.paths.is_empty());
        assert_eq!(c.nested.len(), 1);
        assert_eq!(c.nested[0].command, "cat");
        assert_eq!(c.nested[0].args, &a[4..]);
    }

    #[test]
    fn env_skips_assignments_before_command() {
        let a = args(&["-u", "X", "A=1", "B=2", "bash", "-c", "id"]);
        let c = schema_for("env").unwrap().classify(&a);
        assert_eq!(c.nested[0].command, "bash");
        assert_eq!(c.operands, vec!["A=1", "B=2"]);
    }

    #[test]
    fn find_exec_segments_are_nested() {
        let a = args(&[
            "sub", "-name", "*.txt", "-exec", "grep", "-l", "x", "{}", "+", "-execdir", "wc",
            "{}", ";",
        ]);
        let c = schema_for("find").unwrap().classify(&a);
        assert_eq!(c.paths, vec!["sub"]);
        assert_eq!(c.nested.len(), 2);
        assert_eq!(c.nested[0].command, "grep");
        assert_eq!(c.nested[0].args, &a[5..8]);
        assert_eq!(c.nested[1].command, "wc");
    }

    #[test]
    fn option_presence_handles_bundles_and_long_forms() {
        assert!(option_present("-ni", "-i"));
        assert!(option_present("-i.bak", "-i"));
        assert!(!option_present("--ignore-case", "-i"));
        assert!(option_present("--output=x", "--output"));
        assert!(!option_present("--output-format", "--output"));
        assert!(option_present("-delete", "-delete"));
        assert!(!option_present("-deleted", "-delete"));
    }

    #[test]
    fn lone_dash_is_an_operand() {
        assert!(!is_option("-"));
        assert!(is_option("-n"));
    }
}
