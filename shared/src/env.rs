use std::env;

use strum::EnumString;

#[derive(Default, EnumString, Debug, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

// 開発環境・本番環境のどちら向けのビルドであるかを示す
pub fn which() -> Environment {
    // debug_assertions が on の場合はデバッグビルド、
    // そうでない場合はリリースビルドであると判定する。
    // ENV 環境変数が指定されていればそちらを優先する
    #[cfg(debug_assertions)]
    let default_env = Environment::Development;
    #[cfg(not(debug_assertions))]
    let default_env = Environment::Production;

    match env::var("ENV") {
        Err(_) => default_env,
        Ok(v) => v.parse().unwrap_or(default_env),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lowercase_names() {
        assert_eq!(
            "production".parse::<Environment>().ok(),
            Some(Environment::Production)
        );
        assert_eq!(
            "development".parse::<Environment>().ok(),
            Some(Environment::Development)
        );
        assert!("staging".parse::<Environment>().is_err());
    }
}
