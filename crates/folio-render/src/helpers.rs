//! Built-in Handlebars helpers and the adapter for registry helpers.

use handlebars::{
    BlockContext, Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext,
    RenderError, RenderErrorReason, Renderable, ScopedJson,
};
use serde_json::Value;

use crate::{HelperFn, markdown_to_html};

/// Data key holding the translation table of the page's locale.
pub const TRANSLATIONS_KEY: &str = "translations";

/// Names of the built-in helpers.
pub(crate) const BUILTIN_HELPERS: &[&str] = &[
    "ifequal",
    "ifpage",
    "markdown",
    "repeat",
    "t",
    "unlesspage",
];

/// Register every built-in helper.
pub(crate) fn register_builtins(registry: &mut Handlebars<'static>) {
    registry.register_helper("ifequal", Box::new(IfEqualHelper));
    registry.register_helper("ifpage", Box::new(PageHelper { negate: false }));
    registry.register_helper("markdown", Box::new(MarkdownHelper));
    registry.register_helper("repeat", Box::new(RepeatHelper));
    registry.register_helper("t", Box::new(TranslateHelper));
    registry.register_helper("unlesspage", Box::new(PageHelper { negate: true }));
}

/// Render the block body (or the first parameter for inline use) to a string.
fn block_source<'reg: 'rc, 'rc>(
    h: &Helper<'rc>,
    r: &'reg Handlebars<'reg>,
    ctx: &'rc Context,
    rc: &mut RenderContext<'reg, 'rc>,
) -> Result<String, RenderError> {
    match h.template() {
        Some(t) => t.renders(r, ctx, rc),
        None => Ok(h
            .param(0)
            .and_then(|p| p.value().as_str())
            .unwrap_or_default()
            .to_owned()),
    }
}

/// Remove the common leading indentation of all non-blank lines.
fn strip_indent(text: &str) -> String {
    let indent = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);
    text.lines()
        .map(|line| line.get(indent..).unwrap_or_else(|| line.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `{{#markdown}}...{{/markdown}}` or `{{markdown text}}`.
struct MarkdownHelper;

impl HelperDef for MarkdownHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let source = block_source(h, r, ctx, rc)?;
        out.write(&markdown_to_html(&strip_indent(&source)))?;
        Ok(())
    }
}

/// `{{#repeat n}}...{{/repeat}}` with `@index` bound to the iteration.
struct RepeatHelper;

impl HelperDef for RepeatHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let count = h
            .param(0)
            .and_then(|p| p.value().as_u64())
            .ok_or(RenderErrorReason::ParamNotFoundForIndex("repeat", 0))?;
        let Some(t) = h.template() else {
            return Ok(());
        };
        for i in 0..count {
            let mut block = BlockContext::new();
            block.set_local_var("index", Value::from(i));
            block.set_local_var("first", Value::Bool(i == 0));
            block.set_local_var("last", Value::Bool(i + 1 == count));
            rc.push_block(block);
            let result = t.render(r, ctx, rc, out);
            rc.pop_block();
            result?;
        }
        Ok(())
    }
}

/// `{{#ifpage "a" "b"}}` / `{{#unlesspage ...}}`: compare against the `page` key.
struct PageHelper {
    negate: bool,
}

impl HelperDef for PageHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let page = ctx.data().get("page").and_then(Value::as_str);
        let matched = page.is_some_and(|page| {
            h.params()
                .iter()
                .any(|p| p.value().as_str() == Some(page))
        });
        let branch = if matched == self.negate {
            h.inverse()
        } else {
            h.template()
        };
        if let Some(t) = branch {
            t.render(r, ctx, rc, out)?;
        }
        Ok(())
    }
}

/// `{{#ifequal a b}}...{{else}}...{{/ifequal}}`.
struct IfEqualHelper;

impl HelperDef for IfEqualHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let a = h
            .param(0)
            .ok_or(RenderErrorReason::ParamNotFoundForIndex("ifequal", 0))?;
        let b = h
            .param(1)
            .ok_or(RenderErrorReason::ParamNotFoundForIndex("ifequal", 1))?;
        let branch = if a.value() == b.value() {
            h.template()
        } else {
            h.inverse()
        };
        if let Some(t) = branch {
            t.render(r, ctx, rc, out)?;
        }
        Ok(())
    }
}

/// `{{t "nav.home"}}`: look up a dotted key in the page's translation table.
///
/// Falls back to the key itself when the entry is missing.
struct TranslateHelper;

impl HelperDef for TranslateHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, RenderError> {
        let key = h
            .param(0)
            .and_then(|p| p.value().as_str())
            .ok_or(RenderErrorReason::ParamNotFoundForIndex("t", 0))?;
        let found = ctx
            .data()
            .get(TRANSLATIONS_KEY)
            .and_then(|table| lookup_dotted(table, key))
            .cloned();
        Ok(ScopedJson::Derived(
            found.unwrap_or_else(|| Value::String(key.to_owned())),
        ))
    }
}

fn lookup_dotted<'a>(table: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.').try_fold(table, |node, segment| node.get(segment))
}

/// Adapter exposing a [`HelperFn`] to Handlebars.
pub(crate) struct RegistryHelper {
    pub(crate) name: String,
    pub(crate) func: HelperFn,
}

impl HelperDef for RegistryHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, RenderError> {
        let args: Vec<Value> = h.params().iter().map(|p| p.value().clone()).collect();
        let value = (self.func)(&args, ctx.data()).map_err(|e| {
            RenderErrorReason::Other(format!("Helper \"{}\" failed: {e}", self.name))
        })?;
        Ok(ScopedJson::Derived(value))
    }
}

/// Placeholder left behind by a removed helper.
pub(crate) struct RemovedHelper {
    pub(crate) name: String,
}

impl HelperDef for RemovedHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        _: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, RenderError> {
        Err(RenderErrorReason::Other(format!("Helper \"{}\" is not registered", self.name)).into())
    }
}
