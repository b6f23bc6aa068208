
use crate::{ImportKind, ImportRecord, InputEntry, Metafile, ModuleKey};

pub(crate) fn key(raw: &str) -> ModuleKey {
    ModuleKey::new(raw).expect("valid test key")
}

/// Build a metafile from `(module, imports)` pairs.
pub(crate) fn metafile_from_edges<S: AsRef<str>>(edges: &[(S, Vec<S>)]) -> Metafile {
    let mut meta = Metafile::default();
    for (from, tos) in edges {
        meta.inputs.insert(
            key(from.as_ref()),
            InputEntry {
                bytes: 1,
                imports: tos
                    .iter()
                    .map(|to| ImportRecord {
                        path: key(to.as_ref()),
                        kind: ImportKind::RequireCall,
                    })
                    .collect(),
                file_info: None,
            },
        );
    }
    meta
}
