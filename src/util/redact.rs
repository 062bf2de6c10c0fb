/// ログ出力用にシークレットを伏字化する。先頭4文字だけを残す。
pub(crate) fn redact(input: &str) -> String {
    let mut chars = input.chars();
    let prefix: String = chars.by_ref().take(4).collect();
    if chars.next().is_none() {
        "****".to_string()
    } else {
        format!("{prefix}***")
    }
}
