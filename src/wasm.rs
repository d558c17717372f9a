use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub fn run_project_json(source: &str) -> Result<String, JsValue> {
    crate::run_project_json(source).map_err(|e| JsValue::from_str(&e.to_string()))
}
