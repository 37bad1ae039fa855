//! Boilerplate macros.

/// Lets handlers extract individual [`crate::state::AppState`] fields
/// (`State<ResourceCatalog>`, `State<JobTracker>`, ...) by cloning them out
/// of the shared state.
///
/// ```ignore
/// impl_from_ref!(catalog: ResourceCatalog, jobs: JobTracker);
/// ```
#[macro_export]
macro_rules! impl_from_ref {
    ($($field:ident: $type:ty),+ $(,)?) => {
        $(
            impl axum::extract::FromRef<$crate::state::AppState> for $type {
                fn from_ref(state: &$crate::state::AppState) -> Self {
                    state.$field.clone()
                }
            }
        )+
    };
}
