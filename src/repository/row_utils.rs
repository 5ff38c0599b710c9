// ==========================================
// 工单一致性维护层 - 行映射工具
// ==========================================
// 职责: 枚举编码/JSON 列到领域类型的转换，IN 子句构建
// ==========================================

use rusqlite::types::Type;

/// 构建 IN 子句的 SQL 片段
///
/// 空列表返回永假条件，确保 SQL 语法正确
pub fn build_in_clause<T: AsRef<str>>(column_name: &str, values: &[T]) -> String {
    if values.is_empty() {
        return "1 = 0".to_string();
    }

    let placeholders = values.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
    format!("{} IN ({})", column_name, placeholders)
}

/// 把无法识别的编码转换为 rusqlite 的列转换错误
pub fn parse_code<T>(
    idx: usize,
    raw: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    parse(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("无法识别的编码: {}", raw).into(),
        )
    })
}

/// 把 JSON 解析错误转换为 rusqlite 的列转换错误
pub fn json_error(idx: usize, err: serde_json::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}
