//! Fixtures shared by unit tests.

use crate::domain::{Attr, Hit, Meta};
use config::Verb;
use std::path::PathBuf;

pub(crate) fn attr() -> Attr {
    Attr {
        uid: 1000,
        gid: 1000,
        mode: 0o644,
        ctime: Default::default(),
        mtime: Default::default(),
    }
}

pub(crate) fn hit(path: &str, rules: &[&str], acts: &[Verb]) -> Hit {
    Hit {
        path: PathBuf::from(path),
        meta: Meta::new(
            rules.iter().map(|rule| rule.to_string()).collect(),
            acts.to_vec(),
            attr(),
        ),
    }
}
