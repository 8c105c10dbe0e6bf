// ==========================================
// 国际化 (i18n)
// ==========================================
// 基于 rust-i18n；文案位于 locales/{en,zh-CN}.yml
// rust_i18n::i18n! 宏在 lib.rs 中初始化
// ==========================================

/// 当前语言
pub fn current_locale() -> String {
    rust_i18n::locale().to_string()
}

/// 规范化语言代码
///
/// "zh" / "zh_cn" / "ZH-cn" → "zh-CN"；"en-US" → "en"；不支持的返回 None
pub fn normalize_locale(locale: &str) -> Option<&'static str> {
    let value = locale.trim().to_ascii_lowercase().replace('_', "-");
    match value.as_str() {
        "zh" | "zh-cn" | "zh-hans" => Some("zh-CN"),
        "en" => Some("en"),
        v if v.starts_with("en-") => Some("en"),
        _ => None,
    }
}

/// 设置语言（不支持的语言回退到 en）
///
/// 返回实际生效的语言代码
pub fn set_locale(locale: &str) -> &'static str {
    let applied = normalize_locale(locale).unwrap_or("en");
    rust_i18n::set_locale(applied);
    applied
}

/// 翻译消息（无参数）
///
/// ```no_run
/// use custom_manufacturing::i18n::t;
/// let msg = t("report.status.within_limit");
/// ```
pub fn t(key: &str) -> String {
    rust_i18n::t!(key).to_string()
}

/// 翻译消息并替换 %{name} 占位符
pub fn t_with_args(key: &str, args: &[(&str, &str)]) -> String {
    args.iter().fold(t(key), |text, (k, v)| {
        text.replace(&format!("%{{{}}}", k), v)
    })
}

// locale 为进程级全局状态，断言翻译文本的单元测试需持有此锁
#[cfg(test)]
pub(crate) static LOCALE_TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
