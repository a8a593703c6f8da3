/// 注入点的作用域
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    /// 装配阶段绑定一次，之后字段始终指向同一个组件实例
    #[default]
    Static,

    /// 每次访问都重新解析并构造一个全新的实例
    Access,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Static => write!(f, "static"),
            Scope::Access => write!(f, "access"),
        }
    }
}
