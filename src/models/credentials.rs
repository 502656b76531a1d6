use std::fmt;

/// 登录凭据
#[derive(Clone)]
pub enum Credentials {
    /// 账号 + 密码，走页面登录流程
    Login { identity: String, secret: String },
    /// 已拿到的会话 cookie（`c_user` + `xs`）
    Cookies { c_user: String, xs: String },
}

impl Credentials {
    pub fn kind(&self) -> &'static str {
        match self {
            Credentials::Login { .. } => "login",
            Credentials::Cookies { .. } => "cookies",
        }
    }
}

// 不把密码和 cookie 打进日志
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Login { identity, .. } => f
                .debug_struct("Login")
                .field("identity", identity)
                .field("secret", &"***")
                .finish(),
            Credentials::Cookies { c_user, .. } => f
                .debug_struct("Cookies")
                .field("c_user", c_user)
                .field("xs", &"***")
                .finish(),
        }
    }
}
