/// Format a value in units of ten thousand (万), rounded half up to a whole number.
/// Used for chart axis labels: 13_515_271 -> "1352万".
pub fn format_man(value: f64) -> String {
    format!("{:.0}万", (value / 10_000.0).round())
}

/// Group an integer's digits in threes: 13515271 -> "13,515,271".
pub fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Format a head count for display: "13,515,271人"
pub fn format_people(value: i64) -> String {
    format!("{}人", group_thousands(value))
}

pub fn format_year(year: i32) -> String {
    format!("{}年", year)
}
