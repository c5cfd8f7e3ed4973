//! The fixed extraction instruction sent after the page images.
//!
//! Kept in one place so unit tests can inspect it without a live service. The
//! instruction is Japanese because the certificates are, and the examples in
//! it double as the canonical formats the filename builder expects.

/// The six JSON keys the model must return, in filename order.
pub const FIELD_KEYS: [&str; 6] = ["date", "spec", "size", "charge_no", "project", "maker"];

/// Instruction appended as the final text part of every extraction request.
pub const EXTRACTION_PROMPT: &str = r#"このPDFは鋼材検査証明書（ミルシート）です。
以下の情報を正確に抽出してください：
1. 発行日 (Date of Issue): YYYY.MM.DD形式または発行日付から抽出
2. 規格: JIS G 3101 SS400 のような形式で、SS400の部分を抽出
3. 寸法: 例「19.00X1,540XCOIL」のような形式（カンマを除去してxに統一）
4. 鋼番 (Charge No.): 例「AE4652」
5. 工事名 (Project Name): 【】で囲まれている場合があります
6. メーカー名: 東京製鉄、JFEスチール、日本製鉄など

必ず以下のJSON形式で回答してください（他のテキストは含めず、JSONのみ）:
{
  "date": "YYMMDD形式（例: 251125）",
  "spec": "規格（例: SS400）",
  "size": "寸法（例: 19.00x1540xCOIL）",
  "charge_no": "鋼番（例: AE4652）",
  "project": "工事名（例: ほぼゼロ）",
  "maker": "メーカー名（例: 東京製鉄）"
}"#;
