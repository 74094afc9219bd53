//! Runtime message lookup.

use std::{cell::RefCell, marker::PhantomData, sync::Arc};

use crate::{plural::PluralRule, types::Catalog};

/// Looks messages up in one shared, immutable catalog.
///
/// A miss never fails: the source text is returned unchanged.
#[derive(Debug, Clone)]
pub struct Translator {
    catalog: Arc<Catalog>,
    rule: PluralRule,
}

impl Translator {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        let rule = PluralRule::from_header(&catalog.header);
        Translator { catalog, rule }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn locale(&self) -> &str {
        &self.catalog.locale
    }

    /// Finds `(context, msgid)` and picks the form for `count` (index 0 when
    /// `count` is `None`). Falls back to `msgid` when the message is missing or
    /// untranslated.
    pub fn lookup(&self, context: Option<&str>, msgid: &str, count: Option<u64>) -> String {
        self.find(context, msgid, count)
            .unwrap_or(msgid)
            .to_string()
    }

    fn find(&self, context: Option<&str>, msgid: &str, count: Option<u64>) -> Option<&str> {
        let entry = self.catalog.get(context, msgid)?;
        let index = count.map_or(0, |n| self.rule.index(n));
        entry
            .translations
            .get(index)
            .filter(|form| !form.is_empty())
            .or_else(|| entry.translations.first())
            .map(String::as_str)
            .filter(|form| !form.is_empty())
    }

    pub fn gettext(&self, msgid: &str) -> String {
        self.lookup(None, msgid, None)
    }

    pub fn pgettext(&self, context: &str, msgid: &str) -> String {
        self.lookup(Some(context), msgid, None)
    }

    pub fn ngettext(&self, msgid: &str, msgid_plural: &str, n: u64) -> String {
        self.npgettext_inner(None, msgid, msgid_plural, n)
    }

    pub fn npgettext(&self, context: &str, msgid: &str, msgid_plural: &str, n: u64) -> String {
        self.npgettext_inner(Some(context), msgid, msgid_plural, n)
    }

    fn npgettext_inner(
        &self,
        context: Option<&str>,
        msgid: &str,
        msgid_plural: &str,
        n: u64,
    ) -> String {
        match self.find(context, msgid, Some(n)) {
            Some(form) => form.to_string(),
            None if n == 1 => msgid.to_string(),
            None => msgid_plural.to_string(),
        }
    }

    /// Makes this translator the target of [`__`], [`n__`] and [`p__`] on the
    /// current thread until the returned guard is dropped.
    pub fn install(&self) -> ShorthandGuard {
        let previous = ACTIVE.with(|active| active.replace(Some(self.clone())));
        ShorthandGuard {
            previous,
            _thread_bound: PhantomData,
        }
    }
}

thread_local! {
    static ACTIVE: RefCell<Option<Translator>> = const { RefCell::new(None) };
}

/// Restores the previously installed translator (or none) when dropped.
#[must_use = "the shorthand is uninstalled as soon as the guard is dropped"]
pub struct ShorthandGuard {
    previous: Option<Translator>,
    _thread_bound: PhantomData<*const ()>,
}

impl Drop for ShorthandGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        ACTIVE.with(|active| {
            active.replace(previous);
        });
    }
}

fn with_active<F>(fallback: String, f: F) -> String
where
    F: FnOnce(&Translator) -> String,
{
    ACTIVE.with(|active| active.borrow().as_ref().map(f).unwrap_or(fallback))
}

/// Translates with the translator installed on this thread.
pub fn __(msgid: &str) -> String {
    with_active(msgid.to_string(), |t| t.gettext(msgid))
}

/// Plural form of [`__`].
pub fn n__(msgid: &str, msgid_plural: &str, n: u64) -> String {
    let fallback = if n == 1 { msgid } else { msgid_plural };
    with_active(fallback.to_string(), |t| t.ngettext(msgid, msgid_plural, n))
}

/// Contextual form of [`__`].
pub fn p__(context: &str, msgid: &str) -> String {
    with_active(msgid.to_string(), |t| t.pgettext(context, msgid))
}
