//! The `checkstyle` software feature.

use std::path::{Path, PathBuf};

use crate::binder::BindingContext;
use crate::core::{
    BindingError, Definition, DefinitionShape, ModelShape, SoftwareFeatureDeclaration,
};
use crate::model::{ModelObject, ValueKind};
use crate::plugins::java_library::{JAVA_LIBRARY, JAVA_SOURCES};
use crate::plugins::SoftwarePlugin;
use crate::registry::DeclarationRegistry;
use crate::tasks::task_name;

pub const CHECKSTYLE: &str = "checkstyle";

const DEFAULT_CONFIG: &str = "config/checkstyle/checkstyle.xml";

pub struct CheckstylePlugin;

impl SoftwarePlugin for CheckstylePlugin {
    fn id(&self) -> &'static str {
        "quay.checkstyle"
    }

    fn register(&self, registry: &mut DeclarationRegistry) -> Result<(), BindingError> {
        registry.register(declaration())?;
        Ok(())
    }
}

pub fn declaration() -> SoftwareFeatureDeclaration {
    SoftwareFeatureDeclaration::build(CHECKSTYLE, JAVA_LIBRARY)
        .parent_model(JAVA_SOURCES)
        .default_target("sources.main")
        .definition(
            DefinitionShape::new("CheckstyleDefinition")
                .with_default("configFile", PathBuf::from(DEFAULT_CONFIG))
                .with_default("ignoreFailures", false)
                .field("toolVersion", ValueKind::String),
        )
        .model(ModelShape::new("CheckstyleModel").property("reports", ValueKind::Path))
        .bind(configure)
}

fn configure(
    ctx: &BindingContext<'_>,
    definition: &Definition,
    parent: &ModelObject,
    model: &ModelObject,
) -> anyhow::Result<()> {
    let name = definition.name();
    let java = parent.source_set("java")?;

    let config_file = ctx
        .layout()
        .resolve(definition.path("configFile").unwrap_or(Path::new(DEFAULT_CONFIG)));
    let ignore_failures = definition.bool("ignoreFailures").unwrap_or(false);
    let tool_version = definition.string("toolVersion").map(str::to_string);
    let reports_dir = ctx
        .layout()
        .build_path(format!("reports/checkstyle/{}", name));

    let task = ctx.tasks().register(
        task_name("checkstyle", &name, ""),
        "Checkstyle",
        move |task| {
            task.set_description(format!("Runs Checkstyle against the {} Java sources.", name));
            task.source(java);
            task.set_property("configFile", config_file);
            task.set_property("ignoreFailures", ignore_failures);
            if let Some(version) = tool_version {
                task.set_property("toolVersion", version);
            }
            task.set_output_dir(reports_dir);
            Ok(())
        },
    )?;

    model.bind("reports", &task.output_dir())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::core::{BindingError, RawDefinition};
    use crate::model::ModelValue;
    use crate::test_support::fixtures;
    use std::path::PathBuf;

    #[test]
    fn test_reports_resolve_per_source_set() {
        let binder = fixtures::java_binder();
        let project = fixtures::project("app");
        binder
            .apply(&project, "javaLibrary", &RawDefinition::new())
            .unwrap();

        let binding = binder
            .apply(&project, "checkstyle", &RawDefinition::new().at("sources.test"))
            .unwrap();

        assert_eq!(
            binding.model().path_value("reports").unwrap(),
            PathBuf::from("build/reports/checkstyle/test")
        );

        let spec = project
            .tasks()
            .named("checkstyleTest")
            .unwrap()
            .realize()
            .unwrap();
        assert_eq!(
            spec.property("configFile"),
            Some(&ModelValue::from(PathBuf::from(
                "/work/app/config/checkstyle/checkstyle.xml"
            )))
        );
        assert_eq!(spec.property("ignoreFailures"), Some(&ModelValue::Bool(false)));
        assert!(spec.property("toolVersion").is_none());
    }

    #[test]
    fn test_wrong_field_kind_is_invalid_definition() {
        let binder = fixtures::java_binder();
        let project = fixtures::project("app");
        binder
            .apply(&project, "javaLibrary", &RawDefinition::new())
            .unwrap();

        let err = binder
            .apply(
                &project,
                "checkstyle",
                &RawDefinition::new().with("ignoreFailures", "sometimes"),
            )
            .unwrap_err();
        assert!(matches!(err, BindingError::InvalidDefinition { .. }));
        assert!(!project.tasks().contains("checkstyleMain"));
    }
}
