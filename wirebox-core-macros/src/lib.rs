mod application_impl;
mod attribute_helpers;
mod managed_impl;

use proc_macro::TokenStream;
use proc_macro_error::proc_macro_error;

/// Managed 派生宏
///
/// 生成组件描述符、注入点与配置点，并通过 inventory 提交注册。
///
/// 用法：
/// ```ignore
/// #[derive(Managed)]
/// #[managed(name = "userService")]        // 可选：显式组件名
/// #[managed(manual)]                       // 可选：不参与扫描，只能 register
/// #[implements(UserApi)]                   // 可选：声明实现的接口
/// #[initialize("warm_up")]                 // 可选：初始化回调，方法不能有参数
/// #[clean_up("shutdown")]                  // 可选：清理回调
/// struct UserService {
///     #[wire]                              // 静态作用域，启动时绑定一次
///     repository: Wired<dyn UserRepository>,
///
///     #[wire(name = "Datasource", filter = "environment=prod")]
///     datasource: Wired<Datasource>,
///
///     #[wire]                              // 访问作用域，每次使用构造新实例
///     reports: OnAccess<dyn ReportBuilder>,
///
///     #[inject]                            // 首选构造器参数
///     clock: Arc<dyn Clock>,
///
///     #[configurable(name = "page.size")]
///     page_size: Setting<u32>,
///
///     #[managed(default = "default_tags")] // 非 Default 的初始值
///     tags: Vec<String>,
/// }
/// ```
#[proc_macro_derive(
    Managed,
    attributes(managed, implements, initialize, clean_up, wire, inject, configurable)
)]
#[proc_macro_error]
pub fn derive_managed(input: TokenStream) -> TokenStream {
    managed_impl::derive_managed_impl(input)
}

/// ManagedApplication 派生宏
///
/// 声明应用标记及其扫描的根命名空间，`Context::init::<App>()` 据此发现组件。
///
/// 用法：
/// ```ignore
/// #[derive(ManagedApplication)]
/// #[packages("my_app::services::*", "my_app::repository")]
/// struct App;
/// ```
#[proc_macro_derive(ManagedApplication, attributes(packages))]
#[proc_macro_error]
pub fn derive_managed_application(input: TokenStream) -> TokenStream {
    application_impl::derive_application_impl(input)
}
