use crate::schema::Period;
use chrono::NaiveDate;

const MONTHS_EN: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const MONTHS_ES: [&str; 12] = [
    "ene", "feb", "mar", "abr", "may", "jun", "jul", "ago", "sep", "oct", "nov", "dic",
];

/// Lowercases and strips diacritics and separators, so header and label
/// lookups tolerate the spelling variations seen in real workbooks
/// ("Categoría" vs "Categoria", "Tipo de Cuenta" vs "AccountType").
pub fn normalize_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.trim().to_lowercase().chars() {
        match c {
            'á' | 'à' | 'ä' | 'â' => out.push('a'),
            'é' | 'è' | 'ë' | 'ê' => out.push('e'),
            'í' | 'ì' | 'ï' | 'î' => out.push('i'),
            'ó' | 'ò' | 'ö' | 'ô' => out.push('o'),
            'ú' | 'ù' | 'ü' | 'û' => out.push('u'),
            'ñ' => out.push('n'),
            c if c.is_whitespace() || c == '_' || c == '-' => {}
            c => out.push(c),
        }
    }
    out
}

/// Month number for a short or full month name, English or Spanish.
fn month_number(token: &str) -> Option<u32> {
    let lower = token.trim().to_lowercase();
    let key: String = lower.chars().take(3).collect();
    MONTHS_EN
        .iter()
        .position(|m| *m == key)
        .or_else(|| MONTHS_ES.iter().position(|m| *m == key))
        .map(|i| i as u32 + 1)
}

/// Parses a wide-column header like "ene-25", "Jan-25" or "feb-2025" into a
/// calendar month. Returns `None` for anything else; callers skip the column.
pub fn parse_period_label(label: &str) -> Option<Period> {
    let trimmed = label.trim();
    let (month_part, year_part) = trimmed.split_once(['-', ' ', '/'])?;
    let month = month_number(month_part)?;
    let year_digits = year_part.trim();
    let parsed: i32 = year_digits.parse().ok()?;
    let year = match year_digits.len() {
        2 => 2000 + parsed,
        4 => parsed,
        _ => return None,
    };
    Period::new(year, month)
}

/// Tries the date formats that show up in exported workbooks. Datetime
/// strings keep only their date part.
pub fn parse_date_string(s: &str) -> Option<NaiveDate> {
    const FORMATS: [&str; 6] = [
        "%Y-%m-%d",
        "%d/%m/%Y",
        "%d.%m.%Y",
        "%Y/%m/%d",
        "%d-%m-%Y",
        "%m/%d/%Y",
    ];

    let trimmed = s.trim();
    for fmt in FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(date);
        }
    }
    if let Some((date_part, _)) = trimmed.split_once([' ', 'T']) {
        for fmt in FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(date_part, fmt) {
                return Some(date);
            }
        }
    }
    None
}

/// Parses a numeric cell that may carry currency formatting: symbols,
/// thousands separators, non-breaking spaces, comma decimals.
pub fn parse_number_string(s: &str) -> Option<f64> {
    let trimmed: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '€' && *c != '$')
        .collect();
    if trimmed.is_empty() {
        return None;
    }

    // Both "1.234,56" and "1,234.56" occur; the separator appearing last is
    // the decimal one. With commas only, a single comma reads as the decimal
    // separator and repeated commas as thousands grouping.
    let cleaned = match (trimmed.rfind(','), trimmed.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => trimmed.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => trimmed.replace(',', ""),
        (Some(_), None) => {
            if trimmed.matches(',').count() > 1 {
                trimmed.replace(',', "")
            } else {
                trimmed.replace(',', ".")
            }
        }
        _ => trimmed,
    };

    cleaned.parse().ok()
}
