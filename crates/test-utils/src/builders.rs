#![allow(dead_code)]

use std::path::Path;

use testmux::identity::TestIdentity;
use testmux::worker::{SuiteDecl, TestDecl};

/// Builder for suite-declaration trees, to keep test setup readable.
///
/// ```
/// use testmux_test_utils::builders::{root, suite};
///
/// let tree = root()
///     .test("top level", "/ws/test/a.js")
///     .suite(
///         suite("math")
///             .test("adds", "/ws/test/a.js")
///             .suite(suite("edge cases").test("overflows", "/ws/test/a.js")),
///     )
///     .build();
/// assert_eq!(tree.suites.len(), 1);
/// ```
pub struct SuiteBuilder {
    decl: SuiteDecl,
}

/// The framework's synthetic unnamed root suite.
pub fn root() -> SuiteBuilder {
    SuiteBuilder {
        decl: SuiteDecl::root(),
    }
}

/// A named suite.
pub fn suite(title: &str) -> SuiteBuilder {
    SuiteBuilder {
        decl: SuiteDecl {
            title: title.to_string(),
            ..SuiteDecl::default()
        },
    }
}

impl SuiteBuilder {
    pub fn test(mut self, title: &str, file: impl AsRef<Path>) -> Self {
        self.decl.tests.push(TestDecl {
            title: title.to_string(),
            file: file.as_ref().to_path_buf(),
        });
        self
    }

    pub fn suite(mut self, child: SuiteBuilder) -> Self {
        self.decl.suites.push(child.decl);
        self
    }

    pub fn build(self) -> SuiteDecl {
        self.decl
    }
}

/// Shorthand for an expected identity.
pub fn identity(suite_path: &[&str], name: &str, file: impl AsRef<Path>) -> TestIdentity {
    let stack: Vec<String> = suite_path.iter().map(|s| s.to_string()).collect();
    TestIdentity::new(&stack, name, file.as_ref())
}
