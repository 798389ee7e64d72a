// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Houdini MCP and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Static screening of scripts for operations that can damage the host process or its machine.
//!
//! Scanning is pure text matching against a fixed, ordered rule table. Every matching rule is
//! reported, in table order, so callers get a complete audit list.

use std::sync::OnceLock;

use regex::Regex;

/// Pattern/description pairs, in reporting order.
const RULES: &[(&str, &str)] = &[
    (r"\bhou\.exit\s*\(", "hou.exit() - will close Houdini"),
    (r"\bos\.remove\s*\(", "os.remove() - file deletion"),
    (r"\bos\.unlink\s*\(", "os.unlink() - file deletion"),
    (r"\bshutil\.rmtree\s*\(", "shutil.rmtree() - directory deletion"),
    (r"\bsubprocess\b", "subprocess - shell execution"),
    (r"\bos\.system\s*\(", "os.system() - shell execution"),
    (r#"\bopen\s*\([^)]*["'][wa]"#, "open() with write mode - file writing"),
    (r"\bhou\.hipFile\.clear\s*\(", "hou.hipFile.clear() - scene wipe"),
];

#[derive(Debug)]
struct CompiledRule {
    regex: Regex,
    description: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleMatch {
    /// Position of the rule in the table.
    pub rule: usize,
    pub description: &'static str,
}

fn compiled_rules() -> &'static [CompiledRule] {
    static COMPILED: OnceLock<Vec<CompiledRule>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        RULES
            .iter()
            .filter_map(|&(pattern, description)| match Regex::new(pattern) {
                Ok(regex) => Some(CompiledRule { regex, description }),
                Err(err) => {
                    tracing::error!(pattern, %err, "hazard rule failed to compile");
                    None
                }
            })
            .collect()
    })
}

/// Returns every rule that matches `code`, in rule-table order.
pub fn scan(code: &str) -> Vec<RuleMatch> {
    compiled_rules()
        .iter()
        .enumerate()
        .filter(|(_, rule)| rule.regex.is_match(code))
        .map(|(rule, compiled)| RuleMatch { rule, description: compiled.description })
        .collect()
}

/// Descriptions of all matching rules; the form reported to callers.
pub fn scan_descriptions(code: &str) -> Vec<String> {
    scan(code).into_iter().map(|m| m.description.to_owned()).collect()
}

pub fn rule_count() -> usize {
    RULES.len()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn every_rule_compiles() {
        assert_eq!(compiled_rules().len(), rule_count());
    }

    #[rstest]
    #[case("hou.exit()", "hou.exit() - will close Houdini")]
    #[case("os.remove('/tmp/x')", "os.remove() - file deletion")]
    #[case("os.unlink(path)", "os.unlink() - file deletion")]
    #[case("shutil.rmtree('/tmp')", "shutil.rmtree() - directory deletion")]
    #[case("subprocess.run(['ls'])", "subprocess - shell execution")]
    #[case("os.system('ls')", "os.system() - shell execution")]
    #[case("open('/tmp/out.txt', 'w')", "open() with write mode - file writing")]
    #[case("open(\"log\", \"a\")", "open() with write mode - file writing")]
    #[case("hou.hipFile.clear()", "hou.hipFile.clear() - scene wipe")]
    fn detects_single_rule(#[case] code: &str, #[case] expected: &str) {
        assert_eq!(scan_descriptions(code), vec![expected.to_owned()]);
    }

    #[test]
    fn safe_code_has_no_matches() {
        let code = "node = hou.node('/obj')\ngeo = node.createNode('geo', 'my_geo')\nprint(geo.path())\n";
        assert!(scan(code).is_empty());
    }

    #[test]
    fn reading_a_file_is_not_a_write() {
        assert!(scan("data = open('/tmp/in.txt').read()").is_empty());
        assert!(scan("data = open('/tmp/in.txt', 'r')").is_empty());
    }

    #[test]
    fn word_boundaries_avoid_lookalikes() {
        assert!(scan("myhou.exit()").is_empty());
        assert!(scan("subprocesses = 3").is_empty());
    }

    #[test]
    fn reports_all_matches_in_table_order() {
        let code = "subprocess.call(['rm', '-rf', '/'])\nos.remove('/tmp/file')\nhou.exit()\n";
        let matches = scan(code);
        assert_eq!(matches.iter().map(|m| m.rule).collect::<Vec<_>>(), vec![0, 1, 4]);
    }

    #[test]
    fn repeated_scans_are_identical() {
        let code = "hou.hipFile.clear()\nos.system('x')";
        assert_eq!(scan(code), scan(code));
        assert_eq!(scan(code).len(), 2);
    }
}
