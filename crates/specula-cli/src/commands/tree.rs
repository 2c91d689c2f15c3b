//! `specula tree` — List every named class and module.

use std::path::Path;

use super::{GlobalOptions, Session};
use crate::output::StyledOutput;

pub fn execute(options: &GlobalOptions, image: &Path) -> anyhow::Result<()> {
    let session = Session::open(options, image)?;
    let mut out = StyledOutput::new(options.color_choice(&session.config));

    let mut entries = Vec::new();
    for id in session.vm.with(|rt| rt.live_modules()) {
        let mirror = session.registry.reflect_class(&session.vm, id);
        if mirror.is_anonymous() || mirror.is_singleton_class() {
            continue;
        }
        let name = mirror.name()?;
        let superclass = if mirror.is_class()? {
            Some(match mirror.superclass()? {
                Some(parent) => parent.name()?,
                None => String::new(),
            })
        } else {
            None
        };
        entries.push((name, superclass));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    for (name, superclass) in entries {
        match superclass {
            Some(parent) => {
                out.marker("class  ");
                out.name(&name);
                if !parent.is_empty() {
                    out.dim(" < ");
                    out.plain(&parent);
                }
            }
            None => {
                out.marker("module ");
                out.name(&name);
            }
        }
        out.newline();
    }
    out.flush();
    Ok(())
}
