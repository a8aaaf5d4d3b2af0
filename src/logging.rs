use log::LevelFilter;
use std::io::Write;

/// ロガーを初期化します。
///
/// レベルは引数、環境変数 `RUST_LOG`、既定値 `info` の順に決まります。
/// 既にロガーが設定されている場合はそちらを使い続けます。
pub fn init(level: Option<&str>) {
    let log_level = level
        .and_then(|l| l.parse::<LevelFilter>().ok())
        .or_else(|| std::env::var("RUST_LOG").ok().and_then(|v| v.parse().ok()))
        .unwrap_or(LevelFilter::Info);
    let result = env_logger::Builder::new()
        .filter_level(log_level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {:5}] {}",
                buf.timestamp_seconds(),
                record.level(),
                record.args()
            )
        })
        .try_init();
    match result {
        Ok(()) => log::debug!("ロガーを初期化しました (レベル: {})", log_level),
        Err(e) => log::debug!("既存のロガーを使用します: {e}"),
    }
}
