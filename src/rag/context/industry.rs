//! Industry peer lookup

/// Peers reported for stocks outside the map
pub const DEFAULT_PEERS: &[&str] = &["해당 산업군 전반"];

const INDUSTRY_MAP: &[(&str, &[&str])] = &[
    ("삼성전자", &["SK하이닉스", "한미반도체", "DB하이텍"]),
    ("에코프로", &["포스코홀딩스", "엘앤에프", "LG에너지솔루션"]),
    ("현대차", &["기아", "현대모비스", "현대위아"]),
    ("NAVER", &["카카오", "크래프톤", "엔씨소프트"]),
    ("엔비디아", &["AMD", "인텔", "마이크로소프트", "퀄컴"]),
];

/// Related stocks in the same industry
pub fn related_stocks(stock_name: &str) -> &'static [&'static str] {
    let name = stock_name.trim();
    INDUSTRY_MAP
        .iter()
        .find(|(stock, _)| *stock == name)
        .map(|(_, peers)| *peers)
        .unwrap_or(DEFAULT_PEERS)
}
