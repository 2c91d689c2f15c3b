//! `specula browse` — Show one class or module through its mirror.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use specula_mirrors::{ClassMirror, FieldMirror, MethodMirror, ReflectResult};

use super::{GlobalOptions, Session};
use crate::output::StyledOutput;

/// Everything `browse` reports about a class or module
#[derive(Debug, Serialize)]
pub struct ClassSummary {
    pub name: String,
    pub kind: &'static str,
    pub singleton: bool,
    pub anonymous: bool,
    pub superclass: Option<String>,
    pub ancestors: Vec<String>,
    pub mixins: Vec<String>,
    pub subclasses: Vec<String>,
    pub nesting: Vec<String>,
    pub constants: Vec<FieldSummary>,
    pub class_variables: Vec<FieldSummary>,
    pub class_instance_variables: Vec<FieldSummary>,
    pub nested_classes: Vec<String>,
    pub class_methods: Vec<MethodSummary>,
    pub instance_methods: Vec<MethodSummary>,
    pub source_files: Vec<String>,
    pub file: Option<String>,
    pub package: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FieldSummary {
    pub name: String,
    /// Rendered value; pending autoloads are reported, not loaded
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct MethodSummary {
    pub name: String,
    pub visibility: &'static str,
    pub location: Option<String>,
}

pub fn execute(
    options: &GlobalOptions,
    image: &Path,
    class: &str,
    json: bool,
) -> anyhow::Result<()> {
    let session = Session::open(options, image)?;
    let mirror = session.registry.reflect_named(&session.vm, class)?;
    let summary = summarize(&session, &mirror)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let mut out = StyledOutput::new(options.color_choice(&session.config));
    print_summary(&mut out, &summary);
    out.flush();
    Ok(())
}

fn summarize(session: &Session, mirror: &ClassMirror) -> anyhow::Result<ClassSummary> {
    let is_class = mirror.is_class()?;
    let superclass = if is_class {
        mirror.superclass()?.map(|parent| parent.name()).transpose()?
    } else {
        None
    };

    Ok(ClassSummary {
        name: mirror.name()?,
        kind: if is_class { "class" } else { "module" },
        singleton: mirror.is_singleton_class(),
        anonymous: mirror.is_anonymous(),
        superclass,
        ancestors: names(&mirror.ancestors()?)?,
        mixins: names(&mirror.mixins()?)?,
        subclasses: names(&mirror.subclasses()?)?,
        nesting: names(&mirror.nesting()?)?,
        constants: fields(session, &mirror.constants()?)?,
        class_variables: fields(session, &mirror.class_variables()?)?,
        class_instance_variables: fields(session, &mirror.class_instance_variables()?)?,
        nested_classes: names(&mirror.nested_classes()?)?,
        class_methods: methods(&mirror.class_methods()?),
        instance_methods: methods(&mirror.instance_methods()?),
        source_files: mirror
            .source_files()?
            .iter()
            .map(|file| file.display().to_string())
            .collect(),
        file: mirror.file().map(|file| file.display().to_string()),
        package: mirror.package(),
    })
}

fn names(mirrors: &[Arc<ClassMirror>]) -> ReflectResult<Vec<String>> {
    mirrors.iter().map(|mirror| mirror.name()).collect()
}

fn fields(session: &Session, mirrors: &[Arc<FieldMirror>]) -> ReflectResult<Vec<FieldSummary>> {
    mirrors
        .iter()
        .map(|field| {
            let value = if field.is_pending_autoload()? {
                "(autoload)".to_string()
            } else {
                session.render(&field.value()?)
            };
            Ok(FieldSummary {
                name: field.name().to_string(),
                value,
            })
        })
        .collect()
}

fn methods(mirrors: &[Arc<MethodMirror>]) -> Vec<MethodSummary> {
    mirrors
        .iter()
        .map(|method| MethodSummary {
            name: method.name().to_string(),
            visibility: method.visibility().as_str(),
            location: method.source_location().map(|loc| loc.to_string()),
        })
        .collect()
}

fn print_summary(out: &mut StyledOutput, summary: &ClassSummary) {
    out.marker(summary.kind);
    out.plain(" ");
    out.name(&summary.name);
    if let Some(parent) = &summary.superclass {
        out.dim(" < ");
        out.plain(parent);
    }
    out.newline();

    let mut flags = Vec::new();
    if summary.singleton {
        flags.push("singleton");
    }
    if summary.anonymous {
        flags.push("anonymous");
    }
    if !flags.is_empty() {
        print_line(out, "Flags", &flags.join(", "));
    }
    print_line(out, "File", summary.file.as_deref().unwrap_or("-"));
    print_line(out, "Package", summary.package.as_deref().unwrap_or("-"));
    print_line(out, "Ancestors", &summary.ancestors.join(" > "));
    print_list(out, "Mixins", &summary.mixins);
    print_list(out, "Subclasses", &summary.subclasses);
    print_line(out, "Nesting", &summary.nesting.join(" < "));
    print_list(out, "Nested", &summary.nested_classes);
    print_list(out, "Sources", &summary.source_files);

    print_fields(out, "Constants", &summary.constants);
    print_fields(out, "Class variables", &summary.class_variables);
    print_fields(out, "Class instance variables", &summary.class_instance_variables);
    print_methods(out, "Class methods", &summary.class_methods);
    print_methods(out, "Instance methods", &summary.instance_methods);
}

fn print_line(out: &mut StyledOutput, label: &str, value: &str) {
    out.heading(&format!("  {:<12}", label));
    out.plain(value);
    out.newline();
}

fn print_list(out: &mut StyledOutput, label: &str, values: &[String]) {
    if values.is_empty() {
        print_line(out, label, "-");
    } else {
        print_line(out, label, &values.join(", "));
    }
}

fn print_fields(out: &mut StyledOutput, label: &str, fields: &[FieldSummary]) {
    if fields.is_empty() {
        return;
    }
    out.newline();
    out.bold(label);
    out.newline();
    for field in fields {
        out.plain(&format!("  {} = {}", field.name, field.value));
        out.newline();
    }
}

fn print_methods(out: &mut StyledOutput, label: &str, methods: &[MethodSummary]) {
    if methods.is_empty() {
        return;
    }
    out.newline();
    out.bold(label);
    out.newline();
    for method in methods {
        out.marker(&format!("  {:<10}", method.visibility));
        out.plain(&method.name);
        if let Some(location) = &method.location {
            out.dim(&format!("  {}", location));
        }
        out.newline();
    }
}
