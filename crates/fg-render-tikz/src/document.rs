//! Standalone LaTeX document wrapper.
//!
//! Provides the `TexDocument` struct for wrapping `\feynmandiagram` markup
//! into a file that compiles on its own (LuaLaTeX gives the best results with
//! tikz-feynman's automatic layouts).

use std::fmt::{self, Write};
use std::io;

const DEFAULT_CLASS: &str = "standalone";
const TIKZ_FEYNMAN_COMPAT: &str = "1.1.0";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Package {
    name: String,
    options: Option<String>,
}

/// LaTeX document builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TexDocument {
    class: String,
    class_options: Option<String>,
    packages: Vec<Package>,
    body: Vec<String>,
}

impl TexDocument {
    /// Create a standalone document that loads tikz-feynman.
    #[must_use]
    pub fn new() -> Self {
        Self {
            class: String::from(DEFAULT_CLASS),
            class_options: None,
            packages: vec![Package {
                name: String::from("tikz-feynman"),
                options: Some(format!("compat={TIKZ_FEYNMAN_COMPAT}")),
            }],
            body: Vec::new(),
        }
    }

    /// Set the document class.
    #[must_use]
    pub fn class(mut self, class: &str) -> Self {
        self.class = class.to_string();
        self
    }

    /// Set the document class options, e.g. `border=2pt`.
    #[must_use]
    pub fn class_options(mut self, options: &str) -> Self {
        self.class_options = Some(options.to_string());
        self
    }

    /// Load an extra package. Loading the same package twice is a no-op.
    #[must_use]
    pub fn package(mut self, name: &str, options: Option<&str>) -> Self {
        if self.packages.iter().all(|package| package.name != name) {
            self.packages.push(Package {
                name: name.to_string(),
                options: options.map(str::to_string),
            });
        }
        self
    }

    /// Append a block to the document body.
    #[must_use]
    pub fn body(mut self, block: impl Into<String>) -> Self {
        self.body.push(block.into());
        self
    }

    /// Write the document to a string.
    pub fn write_to_string(&self, output: &mut String) {
        output.push_str("\\documentclass");
        if let Some(ref options) = self.class_options {
            let _ = write!(output, "[{options}]");
        }
        let _ = writeln!(output, "{{{}}}", self.class);

        for package in &self.packages {
            output.push_str("\\usepackage");
            if let Some(ref options) = package.options {
                let _ = write!(output, "[{options}]");
            }
            let _ = writeln!(output, "{{{}}}", package.name);
        }

        output.push_str("\\begin{document}\n");
        for block in &self.body {
            output.push_str(block);
            output.push('\n');
        }
        output.push_str("\\end{document}");
    }

    /// Write the document to an io::Write implementor.
    pub fn write_to<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(self.to_string().as_bytes())
    }
}

impl Default for TexDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TexDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut output = String::with_capacity(1024);
        self.write_to_string(&mut output);
        f.write_str(&output)
    }
}
