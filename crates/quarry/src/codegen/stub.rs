//! Table-only backends.
//!
//! These targets emit the token vocabulary, rule names, the start rule and
//! each rule's alternatives and FIRST set as constants. They are enough to
//! drive a hand-written parser or to check a generated one against.

use super::registry::{Backend, BackendCapabilities};
use super::{CodegenOptions, GeneratedFile, ParserIr, quote_string, to_pascal_case};
use crate::error::CodegenError;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StubLanguage {
    Python,
    Java,
    JavaScript,
    TypeScript,
    Go,
    CSharp,
}

impl StubLanguage {
    pub const ALL: [Self; 6] = [
        Self::Python,
        Self::Java,
        Self::JavaScript,
        Self::TypeScript,
        Self::Go,
        Self::CSharp,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Java => "java",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Go => "go",
            Self::CSharp => "csharp",
        }
    }

    const fn display(self) -> &'static str {
        match self {
            Self::Python => "Python",
            Self::Java => "Java",
            Self::JavaScript => "JavaScript",
            Self::TypeScript => "TypeScript",
            Self::Go => "Go",
            Self::CSharp => "C#",
        }
    }

    const fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Python => &["py", "python3"],
            Self::Java => &[],
            Self::JavaScript => &["js"],
            Self::TypeScript => &["ts"],
            Self::Go => &["golang"],
            Self::CSharp => &["c#", "cs", "dotnet"],
        }
    }

    fn file_name(self, module: &str) -> String {
        let pascal = to_pascal_case(module);
        match self {
            Self::Python => format!("{module}_tables.py"),
            Self::Java => format!("{pascal}Tables.java"),
            Self::JavaScript => format!("{module}_tables.js"),
            Self::TypeScript => format!("{module}_tables.ts"),
            Self::Go => format!("{module}/tables.go"),
            Self::CSharp => format!("{pascal}Tables.cs"),
        }
    }

    const fn comment(self) -> &'static str {
        match self {
            Self::Python => "#",
            _ => "//",
        }
    }
}

/// Backend that renders [`ParserIr`] tables in a non-Rust language
#[derive(Debug, Clone, Copy)]
pub struct StubBackend {
    language: StubLanguage,
}

impl StubBackend {
    #[must_use]
    pub const fn new(language: StubLanguage) -> Self {
        Self { language }
    }

    #[must_use]
    pub const fn language(&self) -> StubLanguage {
        self.language
    }
}

impl Backend for StubBackend {
    fn name(&self) -> &'static str {
        self.language.name()
    }

    fn aliases(&self) -> &'static [&'static str] {
        self.language.aliases()
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            name: self.language.name(),
            language: self.language.display(),
            full_parser: false,
            supports_listener: false,
            supports_visitor: false,
            supports_left_recursion: true,
        }
    }

    fn generate(&self, ir: &ParserIr, options: &CodegenOptions) -> Result<Vec<GeneratedFile>, CodegenError> {
        let module = options.module_for(&ir.driver.grammar);
        let tables = Tables::new(ir);
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} Token and rule tables for grammar {}. Generated by quarry; do not edit.\n",
            self.language.comment(),
            ir.driver.grammar
        );
        match self.language {
            StubLanguage::Python => tables.python(&mut out),
            StubLanguage::Java => tables.java(&to_pascal_case(&module), &mut out),
            StubLanguage::JavaScript => tables.javascript(false, &mut out),
            StubLanguage::TypeScript => tables.javascript(true, &mut out),
            StubLanguage::Go => tables.go(&module, &mut out),
            StubLanguage::CSharp => tables.csharp(&to_pascal_case(&module), &mut out),
        }
        Ok(vec![GeneratedFile {
            path: self.language.file_name(&module),
            contents: out,
        }])
    }
}

/// IR flattened into quoted strings, shared by every language
struct Tables {
    /// (identifier, id, quoted display name)
    tokens: Vec<(String, u32, String)>,
    rules: Vec<RuleTable>,
    start: String,
}

struct RuleTable {
    name: String,
    alternatives: Vec<String>,
    first: Vec<String>,
}

impl Tables {
    fn new(ir: &ParserIr) -> Self {
        Self {
            tokens: ir
                .tokens
                .iter()
                .map(|t| (t.name.clone(), t.id, quote_string(&t.display)))
                .collect(),
            rules: ir
                .rules
                .iter()
                .map(|r| {
                    let mut alternatives: Vec<(usize, &str)> =
                        r.choices.iter().map(|c| (c.index, c.text.as_str())).collect();
                    alternatives.extend(r.operators.iter().map(|o| (o.alternative, o.text.as_str())));
                    alternatives.sort_by_key(|(i, _)| *i);
                    RuleTable {
                        name: quote_string(&r.name),
                        alternatives: alternatives.into_iter().map(|(_, text)| quote_string(text)).collect(),
                        first: r
                            .first
                            .iter()
                            .map(|&t| ir.token(t).name.clone())
                            .collect(),
                    }
                })
                .collect(),
            start: quote_string(&ir.driver.start_rule),
        }
    }

    fn python(&self, out: &mut String) {
        for (name, id, _) in &self.tokens {
            let _ = writeln!(out, "{name} = {id}");
        }
        out.push_str("\nTOKEN_NAMES = [\n");
        for (_, _, display) in &self.tokens {
            let _ = writeln!(out, "    {display},");
        }
        out.push_str("]\n\nRULE_NAMES = [\n");
        for rule in &self.rules {
            let _ = writeln!(out, "    {},", rule.name);
        }
        out.push_str("]\n\nALTERNATIVES = {\n");
        for rule in &self.rules {
            let _ = writeln!(out, "    {}: [{}],", rule.name, rule.alternatives.join(", "));
        }
        out.push_str("}\n\nFIRST = {\n");
        for rule in &self.rules {
            let _ = writeln!(out, "    {}: frozenset([{}]),", rule.name, rule.first.join(", "));
        }
        let _ = writeln!(out, "}}\n\nSTART_RULE = {}", self.start);
    }

    fn java(&self, class: &str, out: &mut String) {
        let _ = writeln!(out, "import java.util.List;\nimport java.util.Map;\nimport java.util.Set;\n");
        let _ = writeln!(out, "public final class {class}Tables {{");
        let _ = writeln!(out, "    private {class}Tables() {{}}\n");
        for (name, id, _) in &self.tokens {
            let _ = writeln!(out, "    public static final int {name} = {id};");
        }
        let _ = writeln!(
            out,
            "\n    public static final String[] TOKEN_NAMES = {{{}}};",
            join(self.tokens.iter().map(|t| t.2.as_str()))
        );
        let _ = writeln!(
            out,
            "    public static final String[] RULE_NAMES = {{{}}};",
            join(self.rules.iter().map(|r| r.name.as_str()))
        );
        out.push_str("    public static final Map<String, List<String>> ALTERNATIVES = Map.ofEntries(\n");
        let entries: Vec<String> = self
            .rules
            .iter()
            .map(|r| format!("        Map.entry({}, List.of({}))", r.name, r.alternatives.join(", ")))
            .collect();
        let _ = writeln!(out, "{});", entries.join(",\n"));
        out.push_str("    public static final Map<String, Set<Integer>> FIRST = Map.ofEntries(\n");
        let entries: Vec<String> = self
            .rules
            .iter()
            .map(|r| format!("        Map.entry({}, Set.of({}))", r.name, r.first.join(", ")))
            .collect();
        let _ = writeln!(out, "{});", entries.join(",\n"));
        let _ = writeln!(out, "    public static final String START_RULE = {};\n}}", self.start);
    }

    fn javascript(&self, typed: bool, out: &mut String) {
        out.push_str("export const Token = Object.freeze({\n");
        for (name, id, _) in &self.tokens {
            let _ = writeln!(out, "  {name}: {id},");
        }
        out.push_str(if typed { "} as const);\n\n" } else { "});\n\n" });
        let (strings, sets) = if typed {
            (": readonly string[]", ": Readonly<Record<string, readonly number[]>>")
        } else {
            ("", "")
        };
        let _ = writeln!(
            out,
            "export const TOKEN_NAMES{strings} = [{}];\n",
            join(self.tokens.iter().map(|t| t.2.as_str()))
        );
        let _ = writeln!(
            out,
            "export const RULE_NAMES{strings} = [{}];\n",
            join(self.rules.iter().map(|r| r.name.as_str()))
        );
        let alternatives = if typed {
            ": Readonly<Record<string, readonly string[]>>"
        } else {
            ""
        };
        let _ = writeln!(out, "export const ALTERNATIVES{alternatives} = {{");
        for rule in &self.rules {
            let _ = writeln!(out, "  {}: [{}],", rule.name, rule.alternatives.join(", "));
        }
        let _ = writeln!(out, "}};\n\nexport const FIRST{sets} = {{");
        for rule in &self.rules {
            let first: Vec<String> = rule.first.iter().map(|t| format!("Token.{t}")).collect();
            let _ = writeln!(out, "  {}: [{}],", rule.name, first.join(", "));
        }
        let _ = writeln!(out, "}};\n\nexport const START_RULE = {};", self.start);
    }

    fn go(&self, package: &str, out: &mut String) {
        let _ = writeln!(out, "package {package}\n\nconst (");
        for (name, id, _) in &self.tokens {
            let _ = writeln!(out, "\t{} = {id}", go_exported(name));
        }
        out.push_str(")\n\nvar TokenNames = []string{\n");
        for (_, _, display) in &self.tokens {
            let _ = writeln!(out, "\t{display},");
        }
        out.push_str("}\n\nvar RuleNames = []string{\n");
        for rule in &self.rules {
            let _ = writeln!(out, "\t{},", rule.name);
        }
        out.push_str("}\n\nvar Alternatives = map[string][]string{\n");
        for rule in &self.rules {
            let _ = writeln!(out, "\t{}: {{{}}},", rule.name, rule.alternatives.join(", "));
        }
        out.push_str("}\n\nvar First = map[string][]int{\n");
        for rule in &self.rules {
            let first: Vec<String> = rule.first.iter().map(|t| go_exported(t)).collect();
            let _ = writeln!(out, "\t{}: {{{}}},", rule.name, first.join(", "));
        }
        let _ = writeln!(out, "}}\n\nconst StartRule = {}", self.start);
    }

    fn csharp(&self, namespace: &str, out: &mut String) {
        let _ = writeln!(out, "using System.Collections.Generic;\n\nnamespace {namespace}\n{{");
        let _ = writeln!(out, "    public static class {namespace}Tables\n    {{");
        for (name, id, _) in &self.tokens {
            let _ = writeln!(out, "        public const int {name} = {id};");
        }
        let _ = writeln!(
            out,
            "\n        public static readonly string[] TokenNames = {{ {} }};",
            join(self.tokens.iter().map(|t| t.2.as_str()))
        );
        let _ = writeln!(
            out,
            "        public static readonly string[] RuleNames = {{ {} }};",
            join(self.rules.iter().map(|r| r.name.as_str()))
        );
        out.push_str(
            "        public static readonly Dictionary<string, string[]> Alternatives = new Dictionary<string, string[]>\n        {\n",
        );
        for rule in &self.rules {
            let _ = writeln!(out, "            [{}] = new[] {{ {} }},", rule.name, rule.alternatives.join(", "));
        }
        out.push_str(
            "        };\n        public static readonly Dictionary<string, int[]> First = new Dictionary<string, int[]>\n        {\n",
        );
        for rule in &self.rules {
            let _ = writeln!(out, "            [{}] = new int[] {{ {} }},", rule.name, rule.first.join(", "));
        }
        let _ = writeln!(
            out,
            "        }};\n        public const string StartRule = {};\n    }}\n}}",
            self.start
        );
    }
}

fn join<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items.collect::<Vec<_>>().join(", ")
}

/// Go constant for a token kind
fn go_exported(name: &str) -> String {
    format!("Token{name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze_left_recursion, compute_first_follow};
    use crate::automaton::build_automaton;
    use crate::grammar::parse_grammar;

    fn generate(language: StubLanguage) -> GeneratedFile {
        let grammar = parse_grammar("grammar Route; file : route* EOF ; route : 'route' ID ';' ; ID : [a-z]+ ;").unwrap();
        let atn = build_automaton(&grammar);
        let sets = compute_first_follow(&grammar);
        let recursion = analyze_left_recursion(&grammar, &sets);
        let ir = ParserIr::build(&grammar, &atn, &sets, &recursion);
        StubBackend::new(language)
            .generate(&ir, &CodegenOptions::default())
            .unwrap()
            .remove(0)
    }

    #[test]
    fn test_python_tables() {
        let file = generate(StubLanguage::Python);
        assert_eq!(file.path, "route_tables.py");
        assert!(file.contents.contains("EOF = 0\nT__0 = 1\n"));
        assert!(file.contents.contains("    \"'route'\",\n"));
        assert!(file.contents.contains("\"route\": frozenset([T__0]),"));
        assert!(file.contents.ends_with("START_RULE = \"file\"\n"));
    }

    #[test]
    fn test_every_language_names_the_start_rule() {
        for language in StubLanguage::ALL {
            let file = generate(language);
            assert!(file.contents.contains("\"file\""), "{language:?}");
            assert!(file.contents.contains("Generated by quarry"), "{language:?}");
        }
        assert_eq!(generate(StubLanguage::Java).path, "RouteTables.java");
        assert_eq!(generate(StubLanguage::Go).path, "route/tables.go");
        assert!(generate(StubLanguage::Go).contents.contains("\tTokenID = 3\n"));
    }
}
