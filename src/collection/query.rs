//! 查询与排序的基础比较

use std::cmp::Ordering;

/// 排序键折叠：小写并去掉常见拉丁字母的变音符号
fn fold(value: &str) -> String {
    let mut folded = String::with_capacity(value.len());
    for c in value.chars().flat_map(char::to_lowercase) {
        match c {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => folded.push('a'),
            'ç' => folded.push('c'),
            'è' | 'é' | 'ê' | 'ë' => folded.push('e'),
            'ì' | 'í' | 'î' | 'ï' => folded.push('i'),
            'ñ' => folded.push('n'),
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' => folded.push('o'),
            'ù' | 'ú' | 'û' | 'ü' => folded.push('u'),
            'ý' | 'ÿ' => folded.push('y'),
            'æ' => folded.push_str("ae"),
            'œ' => folded.push_str("oe"),
            other => folded.push(other),
        }
    }
    folded
}

/// 字符串排序比较
///
/// 折叠后相等时回退到原串比较，保证全序。
pub fn collate(a: &str, b: &str) -> Ordering {
    fold(a).cmp(&fold(b)).then_with(|| a.cmp(b))
}

/// 缺失值视为最小：升序排在最前，降序排在最后
pub fn compare_missing_low<T: PartialOrd>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

/// 按方向应用比较结果
pub fn directed(ordering: Ordering, descending: bool) -> Ordering {
    if descending { ordering.reverse() } else { ordering }
}

/// 不区分大小写的子串匹配；`needle` 应已小写
pub fn matches_query<S: AsRef<str>>(fields: &[S], needle: &str) -> bool {
    fields
        .iter()
        .any(|field| field.as_ref().to_lowercase().contains(needle))
}
