//! 输出解析函数
//!
//! brew 的输出格式不受版本保证，这里的解析都是宽容式的：
//! 不认识的行直接跳过，空输入返回空集合，绝不让整批解析失败。

use super::types::{Package, SearchResult};
use serde::Deserialize;
use std::collections::HashMap;

/// `brew outdated --verbose` 中一条过期记录
#[derive(Debug, Clone, PartialEq)]
pub struct OutdatedInfo {
    pub current_version: String,
    pub new_version: String,
}

/// 解析 `brew list --versions` 输出
///
/// 每行格式：`name version1 version2 ...`，取第二个 token 作为当前版本。
pub fn parse_installed_list(output: &str) -> Vec<Package> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let name = parts.next()?;
            let version = parts.next().unwrap_or("");
            Some(Package {
                name: name.to_string(),
                installed_version: version.to_string(),
                outdated: false,
                available_version: version.to_string(),
            })
        })
        .collect()
}

/// 解析 `brew outdated --verbose` 输出
///
/// 每行格式：`name (current) < new`，不匹配的行跳过。
pub fn parse_outdated(output: &str) -> HashMap<String, OutdatedInfo> {
    let mut map = HashMap::new();

    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let Some(open) = trimmed.find('(') else {
            continue;
        };
        let name = trimmed[..open].trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            continue;
        }
        let rest = &trimmed[open + 1..];
        let Some(close) = rest.find(')') else {
            continue;
        };
        let current = rest[..close].trim();
        let after = rest[close + 1..].trim_start();
        let Some(new_version) = after.strip_prefix('<') else {
            continue;
        };
        let new_version = new_version.trim();
        if current.is_empty() || new_version.is_empty() {
            continue;
        }

        map.insert(
            name.to_string(),
            OutdatedInfo {
                current_version: current.to_string(),
                new_version: new_version.to_string(),
            },
        );
    }

    map
}

/// 把过期信息合并进已安装列表
///
/// 出现在 map 中的包标记 outdated 并记录可升级版本，
/// 其余包 available_version 保持等于 installed_version。
pub fn merge_outdated(
    installed: Vec<Package>,
    outdated: &HashMap<String, OutdatedInfo>,
) -> Vec<Package> {
    installed
        .into_iter()
        .map(|mut pkg| {
            if let Some(info) = outdated.get(&pkg.name) {
                pkg.outdated = true;
                pkg.available_version = info.new_version.clone();
            } else {
                pkg.outdated = false;
                pkg.available_version = pkg.installed_version.clone();
            }
            pkg
        })
        .collect()
}

// ========== brew info --json=v2 ==========

#[derive(Debug, Deserialize)]
pub struct InfoResponse {
    #[serde(default)]
    pub formulae: Vec<FormulaInfo>,
}

#[derive(Debug, Deserialize)]
pub struct FormulaInfo {
    pub name: String,
    #[serde(default)]
    pub desc: Option<String>,
}

/// 解析 `brew info --json=v2` 输出为搜索结果
///
/// JSON 损坏或 formulae 为空时返回空列表，由调用方回退到行解析。
pub fn parse_info_json(output: &str) -> Vec<SearchResult> {
    let Ok(info) = serde_json::from_str::<InfoResponse>(output) else {
        return Vec::new();
    };
    info.formulae
        .into_iter()
        .map(|formula| SearchResult {
            name: formula.name,
            description: formula.desc.unwrap_or_default(),
        })
        .collect()
}

/// 从 `brew info --json=v2` 输出中取第一个 formula 的描述
pub fn parse_info_desc(output: &str) -> Option<String> {
    serde_json::from_str::<InfoResponse>(output)
        .ok()?
        .formulae
        .into_iter()
        .next()?
        .desc
}

// ========== 搜索输出行解析 ==========

/// 包名允许的字符（brew formula 命名：字母数字和 @ . + - _ /）
fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_' | '/')
}

fn is_valid_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_name_char)
}

/// 尝试按 `name<sep>description` 拆分一行
fn split_name_desc(line: &str, sep: char) -> Option<(String, String)> {
    let pos = line.find(sep)?;
    let name = line[..pos].trim();
    if !is_valid_name(name) {
        return None;
    }
    let desc = line[pos + 1..].trim();
    Some((name.to_string(), desc.to_string()))
}

/// 解析 `brew search` 的纯文本输出
///
/// 逐行尝试：`name: description` → `name = description` → 仅包名。
/// 描述缺失的条目留空，由调用方按需补查。
pub fn parse_search_lines(output: &str) -> Vec<SearchResult> {
    let mut results = Vec::new();

    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if is_valid_name(trimmed) {
            results.push(SearchResult {
                name: trimmed.to_string(),
                description: String::new(),
            });
            continue;
        }

        if let Some((name, desc)) = split_name_desc(trimmed, ':') {
            results.push(SearchResult {
                name,
                description: desc,
            });
            continue;
        }

        if let Some((name, desc)) = split_name_desc(trimmed, '=') {
            results.push(SearchResult {
                name,
                description: desc,
            });
            continue;
        }

        // 最后手段：取第一个空白分隔的 token 作为包名
        if let Some(first) = trimmed.split_whitespace().next() {
            if is_valid_name(first) {
                results.push(SearchResult {
                    name: first.to_string(),
                    description: String::new(),
                });
            }
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installed_list_one_package_per_line() {
        let text = "wget 1.24.5\ncurl 8.6.0 8.5.0\n\nhtop 3.3.0\n";
        let pkgs = parse_installed_list(text);
        assert_eq!(pkgs.len(), 3);
        assert_eq!(pkgs[0].name, "wget");
        assert_eq!(pkgs[0].installed_version, "1.24.5");
        // 多版本并存时取第一个
        assert_eq!(pkgs[1].name, "curl");
        assert_eq!(pkgs[1].installed_version, "8.6.0");
        assert!(!pkgs[1].outdated);
        assert_eq!(pkgs[1].available_version, "8.6.0");
    }

    #[test]
    fn installed_list_empty_input() {
        assert!(parse_installed_list("").is_empty());
        assert!(parse_installed_list("   \n  \n").is_empty());
    }

    #[test]
    fn outdated_parses_well_formed_lines() {
        let text = "pkg (1.0) < 2.0\nnode (21.6.1) < 21.6.2\n";
        let map = parse_outdated(text);
        assert_eq!(map.len(), 2);
        let info = &map["pkg"];
        assert_eq!(info.current_version, "1.0");
        assert_eq!(info.new_version, "2.0");
    }

    #[test]
    fn outdated_skips_malformed_lines() {
        let text = "garbage text\npkg (1.0) < 2.0\n==> 提示信息\n(奇怪) < 行\n";
        let map = parse_outdated(text);
        assert_eq!(map.len(), 1);
        assert_eq!(map["pkg"].new_version, "2.0");
    }

    #[test]
    fn merge_marks_outdated_and_keeps_others() {
        let installed = parse_installed_list("wget 1.0\ncurl 8.0\n");
        let outdated = parse_outdated("wget (1.0) < 2.0\n");
        let merged = merge_outdated(installed, &outdated);

        let wget = merged.iter().find(|p| p.name == "wget").unwrap();
        assert!(wget.outdated);
        assert_eq!(wget.available_version, "2.0");

        let curl = merged.iter().find(|p| p.name == "curl").unwrap();
        assert!(!curl.outdated);
        assert_eq!(curl.available_version, curl.installed_version);
    }

    #[test]
    fn info_json_maps_formulae() {
        let json = r#"{"formulae":[{"name":"foo","desc":"Foo tool"}],"casks":[]}"#;
        let results = parse_info_json(json);
        assert_eq!(
            results,
            vec![SearchResult {
                name: "foo".to_string(),
                description: "Foo tool".to_string(),
            }]
        );
    }

    #[test]
    fn info_json_tolerates_garbage() {
        assert!(parse_info_json("not json at all").is_empty());
        assert!(parse_info_json(r#"{"formulae":[]}"#).is_empty());
        assert_eq!(parse_info_desc("not json"), None);
    }

    #[test]
    fn search_lines_colon_equals_and_bare() {
        let text = "wget: Internet file retriever\nripgrep = fast grep\nfd\n";
        let results = parse_search_lines(text);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].name, "wget");
        assert_eq!(results[0].description, "Internet file retriever");
        assert_eq!(results[1].name, "ripgrep");
        assert_eq!(results[1].description, "fast grep");
        assert_eq!(results[2].name, "fd");
        assert!(results[2].description.is_empty());
    }

    #[test]
    fn search_lines_last_resort_first_token() {
        let results = parse_search_lines("some-pkg [installed]\n");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "some-pkg");
        assert!(results[0].description.is_empty());
    }
}
