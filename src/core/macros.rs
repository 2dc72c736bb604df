//! 通用宏
//!
//! 配置结构体的默认值声明

/// 以字段列表的形式为结构体实现 `Default`
///
/// ```rust
/// use quickjs_bind::impl_default;
///
/// struct Limits {
///     max_depth: usize,
///     label: String,
/// }
///
/// impl_default!(Limits {
///     max_depth: 64,
///     label: "limits".to_string(),
/// });
///
/// assert_eq!(Limits::default().max_depth, 64);
/// ```
#[macro_export]
macro_rules! impl_default {
    ($struct_name:ident {
        $($field:ident: $value:expr),* $(,)?
    }) => {
        impl Default for $struct_name {
            fn default() -> Self {
                Self {
                    $($field: $value),*
                }
            }
        }
    };
}
