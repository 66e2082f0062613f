//! Macros for reducing boilerplate in the API crate.

/// Implement `FromRef<AppState>` for one of its fields, so handlers can take
/// `State<MangaService>` instead of the whole state.
///
/// # Example
/// ```ignore
/// impl_from_ref!(MangaService, manga);
/// // Expands to:
/// impl axum::extract::FromRef<AppState> for MangaService {
///     fn from_ref(state: &AppState) -> Self {
///         state.manga.clone()
///     }
/// }
/// ```
#[macro_export]
macro_rules! impl_from_ref {
    ($type:ty, $field:ident) => {
        impl axum::extract::FromRef<$crate::state::AppState> for $type {
            fn from_ref(state: &$crate::state::AppState) -> Self {
                state.$field.clone()
            }
        }
    };
}
