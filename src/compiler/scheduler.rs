//! Pass scheduler for orchestrating generator pass execution.
//!
//! The `PassScheduler` owns an ordered list of passes and runs each of them
//! exactly once over the application context. There is no fixpoint and no
//! parallelism: every pass depends on the complete products of the passes
//! before it.

use std::time::Instant;

use log::{debug, info};

use crate::{
    compiler::{pass::GeneratorPass, EventKind},
    config::GeneratorConfig,
    model::AppContext,
    passes::{
        ConstantInitializationPass, EnumPass, ExceptionHierarchyPass, FieldAccessorPass,
        InitializationClassPass, MarshallingPass, MethodBodyTranslationPass, NativeMethodBodyPass,
        ObjectInterfacePass, PointerConstructorPass, PrimitiveImplicitConversionPass,
        ReferenceAssemblyInjectionPass, StaticConstructorPass, TypeInfoPass, UnstripPass,
    },
    Result,
};

/// Orchestrates generator pass execution.
///
/// The scheduler runs passes in insertion order:
///
/// 1. **Analysis**: type info, unstripping
/// 2. **Surface**: runtime surface, object interfaces, initialization classes
/// 3. **Members**: pointer constructors, conversions, enums, field accessors, exceptions, marshalling
/// 4. **Bodies**: translation, ABI bridges, constant stores, static constructors
///
/// The first pass that fails aborts the run; later passes are not started.
#[derive(Default)]
pub struct PassScheduler {
    /// The passes, in execution order.
    pub passes: Vec<Box<dyn GeneratorPass>>,
}

impl PassScheduler {
    /// Creates an empty scheduler.
    ///
    /// # Returns
    ///
    /// A new `PassScheduler` without passes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the standard pipeline for a configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - The generator configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the configuration
    /// does not validate.
    pub fn from_config(config: &GeneratorConfig) -> Result<Self> {
        config.validate()?;

        let mut scheduler = Self::new();
        scheduler.add(TypeInfoPass);
        scheduler.add(UnstripPass::new(config.companion_assemblies.clone()));
        scheduler.add(ReferenceAssemblyInjectionPass);
        scheduler.add(ObjectInterfacePass);
        scheduler.add(InitializationClassPass::new(config.eager_initialization));
        scheduler.add(PointerConstructorPass);
        scheduler.add(PrimitiveImplicitConversionPass);
        scheduler.add(EnumPass);
        scheduler.add(FieldAccessorPass::new(config.write_barrier));
        scheduler.add(ExceptionHierarchyPass);
        scheduler.add(MarshallingPass);
        if config.translate_bodies {
            scheduler.add(MethodBodyTranslationPass);
        }
        scheduler.add(NativeMethodBodyPass);
        scheduler.add(ConstantInitializationPass);
        scheduler.add(StaticConstructorPass);
        Ok(scheduler)
    }

    /// Appends a pass to the end of the pipeline.
    pub fn add(&mut self, pass: impl GeneratorPass + 'static) {
        self.passes.push(Box::new(pass));
    }

    /// Names of the scheduled passes, in execution order.
    #[must_use]
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Runs every pass once, in order.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The application context.
    ///
    /// # Errors
    ///
    /// Returns the first error a pass reports.
    pub fn run(&self, ctx: &mut AppContext) -> Result<()> {
        for pass in &self.passes {
            info!("Running {}", pass.name());
            debug!("{}: {}", pass.name(), pass.description());
            ctx.events
                .record(EventKind::PassStarted)
                .pass(pass.id())
                .message(pass.name());

            let started = Instant::now();
            pass.process(ctx)?;

            ctx.events
                .record(EventKind::PassCompleted)
                .pass(pass.id())
                .message(format!("{} in {:?}", pass.name(), started.elapsed()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    struct Note(&'static str);

    impl GeneratorPass for Note {
        fn name(&self) -> &'static str {
            self.0
        }

        fn id(&self) -> &'static str {
            self.0
        }

        fn process(&self, ctx: &mut AppContext) -> Result<()> {
            ctx.events.info(self.0);
            Ok(())
        }
    }

    struct Fail;

    impl GeneratorPass for Fail {
        fn name(&self) -> &'static str {
            "Fail"
        }

        fn id(&self) -> &'static str {
            "fail"
        }

        fn process(&self, _ctx: &mut AppContext) -> Result<()> {
            Err(Error::Config("boom".to_string()))
        }
    }

    #[test]
    fn passes_run_in_order_with_events() {
        let mut scheduler = PassScheduler::new();
        scheduler.add(Note("first"));
        scheduler.add(Note("second"));
        let mut ctx = AppContext::new();
        scheduler.run(&mut ctx).unwrap();

        let infos: Vec<_> = ctx
            .events
            .filter_kind(EventKind::Info)
            .map(|e| e.message.clone())
            .collect();
        assert_eq!(infos, vec!["first", "second"]);
        assert_eq!(ctx.events.count_kind(EventKind::PassStarted), 2);
        assert_eq!(ctx.events.count_kind(EventKind::PassCompleted), 2);
    }

    #[test]
    fn first_failure_stops_the_run() {
        let mut scheduler = PassScheduler::new();
        scheduler.add(Fail);
        scheduler.add(Note("never"));
        let mut ctx = AppContext::new();
        assert!(scheduler.run(&mut ctx).is_err());
        assert!(!ctx.events.has(EventKind::Info));
        assert_eq!(ctx.events.count_kind(EventKind::PassCompleted), 0);
    }

    #[test]
    fn configuration_shapes_the_pipeline() {
        let full = PassScheduler::from_config(&GeneratorConfig::full()).unwrap();
        assert_eq!(
            full.pass_names(),
            vec![
                "TypeInfo",
                "Unstrip",
                "ReferenceAssemblyInjection",
                "ObjectInterface",
                "InitializationClass",
                "PointerConstructor",
                "PrimitiveImplicitConversion",
                "Enum",
                "FieldAccessor",
                "ExceptionHierarchy",
                "Marshalling",
                "MethodBodyTranslation",
                "NativeMethodBody",
                "ConstantInitialization",
                "StaticConstructor",
            ]
        );
        let minimal = PassScheduler::from_config(&GeneratorConfig::minimal()).unwrap();
        assert!(!minimal.pass_names().contains(&"MethodBodyTranslation"));
    }
}
