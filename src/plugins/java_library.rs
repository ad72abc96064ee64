//! The `javaLibrary` software type.
//!
//! ```toml
//! version = "17"
//! sourceSets = ["main", "test", "integrationTest"]
//! ```
//!
//! Every source set becomes a `JavaSources` node under `sources` with `java`
//! and `resources` directory sets, a compile task and a resource-processing
//! task. The `jar` task packages the `main` source set.

use anyhow::bail;

use crate::core::{
    BindingError, Definition, DefinitionShape, ModelShape, SoftwareTypeDeclaration,
};
use crate::binder::BindingContext;
use crate::model::{ModelObject, ValueKind};
use crate::plugins::SoftwarePlugin;
use crate::registry::DeclarationRegistry;
use crate::tasks::task_name;

pub const JAVA_LIBRARY: &str = "javaLibrary";

/// Shape name of a source set node; features attach here.
pub const JAVA_SOURCES: &str = "JavaSources";

const DEFAULT_VERSION: &str = "11";
const MAIN: &str = "main";

pub struct JavaLibraryPlugin;

impl SoftwarePlugin for JavaLibraryPlugin {
    fn id(&self) -> &'static str {
        "quay.java-library"
    }

    fn register(&self, registry: &mut DeclarationRegistry) -> Result<(), BindingError> {
        registry.register(declaration())?;
        Ok(())
    }
}

pub fn declaration() -> SoftwareTypeDeclaration {
    SoftwareTypeDeclaration::build(JAVA_LIBRARY)
        .definition(
            DefinitionShape::new("JavaIdealSoftwareType")
                .with_default("version", DEFAULT_VERSION)
                .with_default("sourceSets", vec![MAIN.to_string(), "test".to_string()]),
        )
        .model(
            ModelShape::new("JavaLibraryOutputs")
                .property("jarFile", ValueKind::Path)
                .collection(
                    "sources",
                    ModelShape::new(JAVA_SOURCES)
                        .source_set("java")
                        .source_set("resources")
                        .property("byteCodeDir", ValueKind::Path)
                        .property("processedResourcesDir", ValueKind::Path),
                ),
        )
        .bind(configure)
}

fn configure(ctx: &BindingContext<'_>, definition: &Definition, model: &ModelObject) -> anyhow::Result<()> {
    let version = definition.string("version").unwrap_or(DEFAULT_VERSION).to_string();
    let source_sets = definition.strings("sourceSets").unwrap_or_default();

    if !source_sets.iter().any(|s| s == MAIN) {
        bail!("a java library needs a `{}` source set to build its jar", MAIN);
    }

    for name in source_sets {
        let sources = model.register_child("sources", name)?;

        let java = sources.source_set("java")?;
        java.src_dir(format!("src/{}/java", name));
        java.include("**/*.java")?;

        let resources = sources.source_set("resources")?;
        resources.src_dir(format!("src/{}/resources", name));

        let classes_dir = ctx.layout().build_path(format!("classes/java/{}", name));
        let release = version.clone();
        let compile = ctx.tasks().register(
            task_name("compile", name, "Java"),
            "JavaCompile",
            move |task| {
                task.set_description(format!("Compiles {}.", java.display_name()));
                task.source(java);
                task.set_property("release", release);
                task.set_output_dir(classes_dir);
                Ok(())
            },
        )?;

        let resources_dir = ctx.layout().build_path(format!("resources/{}", name));
        let process = ctx.tasks().register(
            task_name("process", name, "Resources"),
            "Copy",
            move |task| {
                task.set_description(format!("Processes {}.", resources.display_name()));
                task.source(resources);
                task.set_output_dir(resources_dir);
                Ok(())
            },
        )?;

        sources.bind("byteCodeDir", &compile.output_dir())?;
        sources.bind("processedResourcesDir", &process.output_dir())?;
    }

    let main = model.child("sources", MAIN)?;
    let jar_file = ctx
        .layout()
        .build_path(format!("libs/{}.jar", ctx.project().id().name()));

    let jar = ctx.tasks().register("jar", "Jar", move |task| {
        task.set_description("Assembles a jar archive containing the main classes.");
        task.input(&main.property("byteCodeDir")?);
        task.input(&main.property("processedResourcesDir")?);
        task.set_output_file(jar_file);
        Ok(())
    })?;

    model.bind("jarFile", &jar.output_file())?;
    Ok(())
}
