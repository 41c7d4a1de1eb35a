//! Redscript override annotations
//!
//! Recognizes `@replaceMethod(Class)`, `@replaceGlobal()` and
//! `@wrapMethod(Class)` and the function signature that follows them
//! (possibly spread over several lines).

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

/// How many lines after an annotation may hold its signature
const SIGNATURE_LOOKAHEAD: usize = 10;

fn annotation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*@(replaceMethod|replaceGlobal|wrapMethod)\(\s*(\w*)\s*\)")
            .expect("annotation pattern is valid")
    })
}

fn signature_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?:public|protected|private)?\s*(?:static\s+)?(?:cb\s+)?func\s+(\w+)\s*\(([^)]*)\)(?:\s*->\s*(\S[^{;]*))?",
        )
        .expect("signature pattern is valid")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AnnotationKind {
    ReplaceMethod,
    ReplaceGlobal,
    WrapMethod,
}

impl AnnotationKind {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "replaceMethod" => Some(Self::ReplaceMethod),
            "replaceGlobal" => Some(Self::ReplaceGlobal),
            "wrapMethod" => Some(Self::WrapMethod),
            _ => None,
        }
    }

    pub fn is_replace(&self) -> bool {
        !matches!(self, Self::WrapMethod)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReplaceMethod => "replaceMethod",
            Self::ReplaceGlobal => "replaceGlobal",
            Self::WrapMethod => "wrapMethod",
        }
    }
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One annotated function found in a script file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptOverride {
    pub annotation: AnnotationKind,
    /// Target class, or `global`
    pub scope: String,
    pub function: String,
    pub param_types: Vec<String>,
    pub return_type: String,
    /// 1-based line of the annotation
    pub line: usize,
}

impl ScriptOverride {
    /// `Class::func(T1, T2)`; the return type is not part of the key
    pub fn key(&self) -> String {
        format!(
            "{}::{}({})",
            self.scope,
            self.function,
            self.param_types.join(", ")
        )
    }
}

/// Keeps only the types of a parameter list (`a: Int32, opt b: String`)
///
/// Commas nested in generic arguments (`script_ref<A, B>`) do not split.
fn param_types(raw: &str) -> Vec<String> {
    let mut params = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in raw.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                params.push(&raw[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(&raw[start..]);

    params
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| match p.split_once(':') {
            Some((_, ty)) => ty.trim().to_string(),
            None => p.to_string(),
        })
        .collect()
}

/// Line text without its `//` comment
fn code_part(line: &str) -> &str {
    line.find("//").map_or(line, |at| &line[..at])
}

/// Extracts every override annotation with a recognizable signature
pub fn parse_redscript(source: &str) -> Vec<ScriptOverride> {
    let lines: Vec<&str> = source.lines().collect();
    let mut found = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let Some(caps) = annotation_re().captures(lines[i]) else {
            i += 1;
            continue;
        };
        let Some(annotation) = AnnotationKind::parse(&caps[1]) else {
            i += 1;
            continue;
        };
        let target = caps[2].to_string();
        let scope = match annotation {
            AnnotationKind::ReplaceGlobal => "global".to_string(),
            _ if target.is_empty() => {
                debug!(line = i + 1, "Method annotation without a class, skipping");
                i += 1;
                continue;
            }
            _ => target,
        };

        // The signature may sit on the annotation line itself
        let mut window = code_part(&lines[i][caps.get(0).map_or(0, |m| m.end())..]).to_string();
        let mut matched = None;
        let mut j = i;
        loop {
            if let Some(sig) = signature_re().captures(&window) {
                matched = Some((
                    sig[1].to_string(),
                    param_types(&sig[2]),
                    sig.get(3)
                        .map(|m| m.as_str().trim().trim_end_matches('{').trim().to_string())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "Void".to_string()),
                ));
                break;
            }
            j += 1;
            if j >= lines.len() || j > i + SIGNATURE_LOOKAHEAD || annotation_re().is_match(lines[j])
            {
                break;
            }
            window.push(' ');
            window.push_str(code_part(lines[j]));
        }

        match matched {
            Some((function, param_types, return_type)) => {
                found.push(ScriptOverride {
                    annotation,
                    scope,
                    function,
                    param_types,
                    return_type,
                    line: i + 1,
                });
                i = j + 1;
            }
            None => {
                debug!(line = i + 1, "No function signature after annotation");
                i += 1;
            }
        }
    }

    found
}
