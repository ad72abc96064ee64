//! The `antlr` software feature.
//!
//! Attaches to a `JavaSources` node of a `javaLibrary`. Grammars live under
//! `src/<set>/antlr`; generated parsers land in
//! `build/generated-src/antlr/<set>` and are added to the node's `java`
//! sources.

use crate::binder::BindingContext;
use crate::core::{
    BindingError, Definition, DefinitionShape, ModelShape, SoftwareFeatureDeclaration,
};
use crate::model::{ModelObject, ValueKind};
use crate::plugins::java_library::{JAVA_LIBRARY, JAVA_SOURCES};
use crate::plugins::SoftwarePlugin;
use crate::registry::DeclarationRegistry;
use crate::tasks::task_name;

pub const ANTLR: &str = "antlr";

pub struct AntlrPlugin;

impl SoftwarePlugin for AntlrPlugin {
    fn id(&self) -> &'static str {
        "quay.antlr"
    }

    fn register(&self, registry: &mut DeclarationRegistry) -> Result<(), BindingError> {
        registry.register(declaration())?;
        Ok(())
    }
}

pub fn declaration() -> SoftwareFeatureDeclaration {
    SoftwareFeatureDeclaration::build(ANTLR, JAVA_LIBRARY)
        .parent_model(JAVA_SOURCES)
        .default_target("sources.main")
        .definition(
            DefinitionShape::new("AntlrGrammarsDefinition")
                .field("arguments", ValueKind::StringList)
                .field("packageName", ValueKind::String),
        )
        .model(
            ModelShape::new("AntlrGeneratedSources")
                .property("generatedSourcesDir", ValueKind::Path)
                .source_set("grammar"),
        )
        .bind(configure)
}

fn configure(
    ctx: &BindingContext<'_>,
    definition: &Definition,
    parent: &ModelObject,
    model: &ModelObject,
) -> anyhow::Result<()> {
    let name = definition.name();

    let grammar = model.source_set("grammar")?;
    grammar.src_dir(format!("src/{}/antlr", name));
    grammar.include("**/*.g")?;
    grammar.include("**/*.g4")?;

    let output_dir = ctx
        .layout()
        .build_path(format!("generated-src/antlr/{}", name));

    let mut arguments = definition.strings("arguments").unwrap_or_default().to_vec();
    if let Some(package) = definition.string("packageName") {
        arguments.push("-package".to_string());
        arguments.push(package.to_string());
    }

    let task_output = output_dir.clone();
    let task = ctx.tasks().register(
        task_name("generate", &name, "Sources"),
        "AntlrTask",
        move |task| {
            task.set_description(format!("Processes the {} Antlr grammars.", name));
            task.source(grammar);
            task.set_property("arguments", arguments);
            task.set_output_dir(task_output);
            Ok(())
        },
    )?;

    // Reading the java roots realizes the generator task.
    parent.source_set("java")?.src_dir_lazy(task.output_dir());

    model.set("generatedSourcesDir", output_dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::core::RawDefinition;
    use crate::model::ModelValue;
    use crate::test_support::fixtures;
    use std::path::PathBuf;

    #[test]
    fn test_generated_sources_join_parent_java_roots() {
        let binder = fixtures::java_binder();
        let project = fixtures::project("app");

        binder
            .apply(&project, "javaLibrary", &RawDefinition::new())
            .unwrap();
        let antlr = binder
            .apply(&project, "antlr", &RawDefinition::new())
            .unwrap();

        let parent = antlr.parent_model().unwrap();
        assert_eq!(parent.path().to_string(), "sources.main");

        let task = project.tasks().named("generateMainSources").unwrap();
        assert!(!task.is_realized());

        assert_eq!(
            parent.source_set("java").unwrap().src_dirs().unwrap(),
            vec![
                PathBuf::from("src/main/java"),
                PathBuf::from("build/generated-src/antlr/main"),
            ]
        );
        assert!(task.is_realized());
    }

    #[test]
    fn test_task_carries_grammar_sources_and_arguments() {
        let binder = fixtures::java_binder();
        let project = fixtures::project("app");
        binder
            .apply(&project, "javaLibrary", &RawDefinition::new())
            .unwrap();

        let raw = RawDefinition::from_toml_str(
            "arguments = [\"-visitor\"]\npackageName = \"org.example.grammar\"\n",
        )
        .unwrap();
        binder.apply(&project, "antlr", &raw).unwrap();

        let spec = project
            .tasks()
            .named("generateMainSources")
            .unwrap()
            .realize()
            .unwrap();
        assert_eq!(spec.description(), Some("Processes the main Antlr grammars."));
        assert_eq!(
            spec.property("arguments"),
            Some(&ModelValue::from(vec![
                "-visitor".to_string(),
                "-package".to_string(),
                "org.example.grammar".to_string(),
            ]))
        );

        let grammar = &spec.sources()[0];
        assert_eq!(grammar.src_dirs().unwrap(), vec![PathBuf::from("src/main/antlr")]);
        assert!(grammar.filter().matches(&PathBuf::from("org/example/Expr.g4")));
        assert!(!grammar.filter().matches(&PathBuf::from("org/example/Expr.java")));
    }
}
