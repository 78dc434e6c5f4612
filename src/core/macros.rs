//! 核心宏定义

/// 为结构体实现Default trait的宏
///
/// 使用示例:
/// ```ignore
/// struct Light {
///     intensity: f32,
///     color: Vec3,
/// }
///
/// impl_default!(Light {
///     intensity: 1.0,
///     color: Vec3::ONE,
/// });
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

/// 同时实现Default和new()的宏
#[macro_export]
macro_rules! impl_default_and_new {
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

        impl $struct_name {
            pub fn new() -> Self {
                Self::default()
            }
        }
    };
}

#[cfg(test)]
mod tests {
    struct Counter {
        clicks: u32,
        label: String,
    }

    impl_default_and_new!(Counter {
        clicks: 0,
        label: String::from("clicks"),
    });

    #[test]
    fn test_impl_default_and_new() {
        let a = Counter::default();
        let b = Counter::new();

        assert_eq!(a.clicks, 0);
        assert_eq!(a.label, "clicks");
        assert_eq!(b.clicks, a.clicks);
    }
}
