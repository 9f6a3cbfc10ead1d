//! Binding of the class rewriter to rendered components.
//!
//! [`Themed`] wraps any [`Component`] whose props carry a class string. Each
//! render rewrites the *authored* class string for the current theme, so a
//! rewritten string is never fed back into the rewriter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::services::theme_store::{Subscription, ThemeStore};
use crate::ui::theme::ThemeId;

/// Props that carry a utility-class string.
pub trait ClassNameProp {
    fn class_name(&self) -> Option<&str>;
    fn set_class_name(&mut self, class_name: String);
}

/// Anything renderable from props.
pub trait Component {
    type Props: ClassNameProp;
    type Output;

    fn render(&self, props: Self::Props) -> Self::Output;
}

struct Memo {
    authored: String,
    theme: ThemeId,
    rewritten: String,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A mounted component whose class names follow the active theme.
///
/// The store subscription lives exactly as long as the wrapper.
pub struct Themed<C: Component> {
    inner: C,
    store: ThemeStore,
    subscription: Subscription,
    stale: Arc<AtomicBool>,
    memo: Mutex<Option<Memo>>,
}

impl<C: Component> Themed<C> {
    pub fn mount(inner: C, store: &ThemeStore) -> Self {
        Self::mount_with(inner, store, |_| {})
    }

    /// Mount and call `on_change` whenever the active theme changes.
    /// Hosts use it to schedule a re-render.
    pub fn mount_with<F>(inner: C, store: &ThemeStore, on_change: F) -> Self
    where
        F: Fn(ThemeId) + Send + Sync + 'static,
    {
        let stale = Arc::new(AtomicBool::new(false));
        let last_theme = Mutex::new(store.active_theme());

        let flag = Arc::clone(&stale);
        let subscription = store.subscribe(move |state| {
            {
                let mut last = lock(&last_theme);
                if *last == state.active_theme {
                    return;
                }
                *last = state.active_theme;
            }
            flag.store(true, Ordering::SeqCst);
            on_change(state.active_theme);
        });

        Self {
            inner,
            store: store.clone(),
            subscription,
            stale,
            memo: Mutex::new(None),
        }
    }

    /// True when the theme changed since the last render
    pub fn needs_render(&self) -> bool {
        self.stale.load(Ordering::SeqCst)
    }

    /// Render with the class string rewritten for the active theme.
    /// A missing class string becomes an empty one; other props are untouched.
    pub fn render(&self, mut props: C::Props) -> C::Output {
        let theme = self.store.active_theme();
        let class_name = props
            .class_name()
            .map(|authored| self.themed_class(authored, theme))
            .unwrap_or_default();
        props.set_class_name(class_name);
        self.stale.store(false, Ordering::SeqCst);
        self.inner.render(props)
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    fn themed_class(&self, authored: &str, theme: ThemeId) -> String {
        let mut memo = lock(&self.memo);
        if let Some(hit) = memo
            .as_ref()
            .filter(|m| m.theme == theme && m.authored == authored)
        {
            return hit.rewritten.clone();
        }

        let rewritten = self.store.rewriter().rewrite(authored, theme);
        *memo = Some(Memo {
            authored: authored.to_string(),
            theme,
            rewritten: rewritten.clone(),
        });
        rewritten
    }
}

impl<C: Component> Drop for Themed<C> {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
    }
}

/// Ad-hoc rewriting for call sites that are not wrapped components.
#[derive(Debug, Clone, Copy)]
pub struct ThemeClasses<'a> {
    store: &'a ThemeStore,
}

impl<'a> ThemeClasses<'a> {
    pub fn new(store: &'a ThemeStore) -> Self {
        Self { store }
    }

    pub fn class_name(&self, authored: &str) -> String {
        self.store
            .rewriter()
            .rewrite(authored, self.store.active_theme())
    }
}
