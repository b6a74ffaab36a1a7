//! Verity CLI - Declarative Constraint Validation
//!
//! Validates JSON instance documents against a JSON mapping document.

use anyhow::{bail, Context, Result};
use std::path::Path;
use verity::core::TypeKind;
use verity::metadata::{ElementMetadata, TypeMetadata};
use verity::prelude::*;

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage(&args[0]);
        return;
    }

    let outcome = match args[1].as_str() {
        "check" => check(&args[2..]),
        "describe" => describe(&args[2..]),
        "help" | "--help" | "-h" => {
            print_usage(&args[0]);
            Ok(true)
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage(&args[0]);
            Ok(false)
        }
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("Error: {:#}", err);
            if let Some(fix) = err
                .downcast_ref::<VerityError>()
                .and_then(|e| match e {
                    VerityError::Configuration(c) => c.suggested_fix(),
                    _ => None,
                })
                .or_else(|| err.downcast_ref::<ConfigurationError>().and_then(|c| c.suggested_fix()))
            {
                eprintln!("Hint: {}", fix);
            }
            std::process::exit(2);
        }
    }
}

fn print_usage(program: &str) {
    println!("Verity v{}", verity::VERSION);
    println!();
    println!("Usage: {} <command> [options]", program);
    println!();
    println!("Commands:");
    println!("  check <mapping.json> <instance.json> [options]  Validate an instance document");
    println!("  describe <mapping.json> <Type>                  Show the constraints of a type");
    println!("  help                                            Show this help message");
    println!();
    println!("Check options:");
    println!("  --groups <A,B>            Groups to validate (default: Default)");
    println!("  --fail-fast               Stop at the first violation");
    println!("  --fail-fast-on-property   Stop after the first failing property");
    println!("  --json                    Print violations as JSON");
    println!();
    println!("An instance document holds one bean or an array of beans; objects");
    println!("carrying \"$type\" become beans.");
}

fn load_validator(mapping_path: &str, options: ValidationOptions) -> Result<Validator> {
    let document = MappingDocument::from_path(mapping_path)
        .with_context(|| format!("failed to load mapping document {}", mapping_path))?;
    let name = Path::new(mapping_path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| mapping_path.to_string());
    let validator = Validator::builder().document(name, &document).options(options).build()?;
    Ok(validator)
}

/// Returns `Ok(false)` when violations were found.
fn check(args: &[String]) -> Result<bool> {
    if args.len() < 2 {
        bail!("check needs a mapping document and an instance document");
    }
    let (mapping_path, instance_path) = (&args[0], &args[1]);

    let mut options = ValidationOptions::new();
    let mut groups: Vec<GroupId> = Vec::new();
    let mut json = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--groups" if i + 1 < args.len() => {
                groups = args[i + 1]
                    .split(',')
                    .map(str::trim)
                    .filter(|g| !g.is_empty())
                    .map(GroupId::new)
                    .collect();
                i += 1;
            }
            "--fail-fast" => options = options.with_fail_fast(true),
            "--fail-fast-on-property" => options = options.with_fail_fast_on_property(true),
            "--json" => json = true,
            other => bail!("unknown option '{}'", other),
        }
        i += 1;
    }

    let validator = load_validator(mapping_path, options)?;

    let text = std::fs::read_to_string(instance_path)
        .with_context(|| format!("failed to read instance document {}", instance_path))?;
    let instance: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", instance_path))?;
    let beans: Vec<BeanRef> = match instance_from_json(&instance)? {
        Value::Bean(bean) => vec![bean],
        Value::List(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Bean(bean) => Ok(bean),
                other => bail!("instance array holds a non-bean value: {}", other),
            })
            .collect::<Result<_>>()?,
        other => bail!("instance document is not a bean: {}", other),
    };

    let mut all = Vec::new();
    for result in validator.validate_batch(&beans, &groups) {
        all.extend(result?);
    }
    let violations = ViolationSet::new(all);

    if json {
        println!("{}", violations.to_json()?);
    } else if violations.is_empty() {
        println!("✓ {} bean(s) valid", beans.len());
    } else {
        println!("✗ {} violation(s):", violations.len());
        for violation in &violations {
            println!("  • {}", violation);
        }
    }
    Ok(violations.is_empty())
}

fn describe(args: &[String]) -> Result<bool> {
    if args.len() < 2 {
        bail!("describe needs a mapping document and a type name");
    }
    let validator = load_validator(&args[0], ValidationOptions::new())?;
    let meta = validator.type_metadata(&TypeName::new(&args[1]))?;
    print_type(&meta, validator.hierarchy());
    Ok(true)
}

fn print_type(meta: &TypeMetadata, types: &TypeHierarchy) {
    let hierarchy: Vec<String> = meta
        .hierarchy()
        .iter()
        .map(|t| match types.kind(t) {
            TypeKind::Class => t.to_string(),
            TypeKind::Interface => format!("{} (interface)", t),
        })
        .collect();
    println!("📦 {}", meta.type_name());
    println!("   Hierarchy: {}", hierarchy.join(" → "));
    if let Some(sequence) = match meta.default_group_sequence() {
        verity::metadata::DefaultGroupSequence::Static(groups) => {
            Some(groups.iter().map(GroupId::as_str).collect::<Vec<_>>().join(", "))
        }
        verity::metadata::DefaultGroupSequence::Provider(_) => Some("<provider>".to_string()),
        verity::metadata::DefaultGroupSequence::Implicit => None,
    } {
        println!("   Default group sequence: {}", sequence);
    }
    println!("   Constraints: {}", meta.constraint_count());

    for constraint in meta.class_constraints() {
        println!("   • (class) {}", describe_constraint(constraint));
    }
    for property in meta.properties() {
        print_element(property);
    }
    for executable in meta.executables() {
        println!("   ⚙ {}({} parameters)", executable.name(), executable.parameter_count());
        for parameter in executable.parameters() {
            print_element(parameter);
        }
        if let Some(return_value) = executable.return_value() {
            print_element(return_value);
        }
    }
}

fn print_element(element: &ElementMetadata) {
    let mut flags = Vec::new();
    if let Some(declared) = element.declared_type() {
        flags.push(format!("type {}", declared));
    }
    if element.cascading().is_cascading() {
        flags.push("cascaded".to_string());
    }
    for (from, to) in element.cascading().conversions().iter() {
        flags.push(format!("{} → {}", from, to));
    }
    if flags.is_empty() {
        println!("   ├ {}", element.name());
    } else {
        println!("   ├ {} [{}]", element.name(), flags.join(", "));
    }
    for constraint in element.constraints() {
        println!("   │   • {}", describe_constraint(constraint));
    }
    for container in element.cascading().container_elements() {
        for constraint in container.constraints() {
            println!("   │   • <{}> {}", container.type_argument(), describe_constraint(constraint));
        }
    }
}

fn describe_constraint(constraint: &verity::metadata::MetaConstraint) -> String {
    let descriptor = constraint.descriptor();
    let groups: Vec<&str> = descriptor.groups().iter().map(GroupId::as_str).collect();
    let mut text = descriptor.kind().to_string();
    if !descriptor.attributes().is_empty() {
        let attributes: Vec<String> = descriptor
            .attributes()
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        text.push_str(&format!("({})", attributes.join(", ")));
    }
    format!("{} [{}] from {}", text, groups.join(", "), constraint.declaring_type())
}
