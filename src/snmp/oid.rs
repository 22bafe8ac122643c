use std::cmp::Ordering;

use snmp2::Oid;

use crate::error::ProtocolError;

/// Парсит строку OID ("1.3.6.1..." или ".1.3.6.1...") в объект Oid
pub fn parse_oid(s: &str) -> Result<Oid<'static>, ProtocolError> {
    let parts = components(s).ok_or_else(|| ProtocolError::InvalidOid(s.to_string()))?;

    Oid::from(&parts).map_err(|e| ProtocolError::InvalidOid(format!("{}: {:?}", s, e)))
}

/// Приводит OID к каноничному виду без ведущей точки
pub fn normalize(s: &str) -> String {
    s.trim().trim_start_matches('.').to_string()
}

/// Числовые компоненты OID; `None`, если хоть один компонент не число
pub fn components(s: &str) -> Option<Vec<u64>> {
    let parts: Result<Vec<u64>, _> = s
        .trim()
        .split('.')
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<u64>())
        .collect();

    parts.ok().filter(|p| !p.is_empty())
}

/// Лексикографическое сравнение OID по числовым компонентам
pub fn compare(a: &str, b: &str) -> Ordering {
    match (components(a), components(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => normalize(a).cmp(&normalize(b)),
    }
}

/// `oid` лежит внутри поддерева `root` (сам корень не считается)
pub fn is_in_subtree(root: &str, oid: &str) -> bool {
    let root = normalize(root);
    let oid = normalize(oid);

    oid.len() > root.len() && oid.starts_with(&root) && oid.as_bytes()[root.len()] == b'.'
}

/// Последний числовой компонент OID, он же индекс сущности
pub fn trailing_index(oid: &str) -> Option<&str> {
    let last = oid.trim().rsplit('.').next()?;
    (!last.is_empty() && last.bytes().all(|b| b.is_ascii_digit())).then_some(last)
}

/// Часть OID после корня поддерева, без разделителя
pub fn suffix<'a>(root: &str, oid: &'a str) -> Option<&'a str> {
    let root = normalize(root);
    let trimmed = oid.trim().trim_start_matches('.');
    trimmed.strip_prefix(root.as_str())?.strip_prefix('.')
}
