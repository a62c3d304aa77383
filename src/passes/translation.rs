//! Translation of recovered original bodies.

use log::info;

use crate::{
    compiler::{EventKind, GeneratorPass},
    model::{AppContext, MethodId},
    translation::{translate, Translation},
    Result,
};

/// Runs the translator over every recovered body.
///
/// Methods whose translation is unsupported keep no body here and are
/// bridged by [`NativeMethodBodyPass`](crate::passes::NativeMethodBodyPass).
pub struct MethodBodyTranslationPass;

impl GeneratorPass for MethodBodyTranslationPass {
    fn name(&self) -> &'static str {
        "MethodBodyTranslation"
    }

    fn id(&self) -> &'static str {
        "method_body_translation"
    }

    fn description(&self) -> &'static str {
        "Rewrites recovered bodies to marshal between native and managed values"
    }

    fn process(&self, ctx: &mut AppContext) -> Result<()> {
        let mut methods: Vec<MethodId> = ctx.extras.original_bodies.iter().map(|(m, _)| m).collect();
        methods.sort_unstable();

        let mut translated = 0usize;
        let mut attempts = 0usize;
        for method in methods {
            // Detached methods are not emitted.
            if !ctx.ty(ctx.method(method).declaring).methods.contains(&method) {
                continue;
            }
            if ctx.extras.bodies.contains(method) {
                continue;
            }
            attempts += 1;
            let Some(original) = ctx.extras.original_bodies.get(method) else {
                continue;
            };
            match translate(ctx, method, original)? {
                Translation::Translated(body) => {
                    ctx.extras.bodies.attach(method, body)?;
                    ctx.events
                        .record(EventKind::BodyTranslated)
                        .method(method)
                        .pass(self.id());
                    translated += 1;
                }
                Translation::Unsupported(reason) => {
                    ctx.events
                        .record(EventKind::TranslationFallback)
                        .method(method)
                        .pass(self.id())
                        .message(reason);
                }
            }
        }
        info!("Translated the original method body for {translated}/{attempts} attempts.");
        Ok(())
    }
}
