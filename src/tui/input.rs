//! 共享文本编辑工具函数，支持 UTF-8 (中英文)

/// UTF-8 安全的字符位置转字节位置
pub fn char_to_byte(s: &str, char_pos: usize) -> usize {
    s.char_indices()
        .nth(char_pos)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// 在字符串的指定光标位置插入字符，返回新的光标位置
pub fn str_insert_char(s: &mut String, cursor: &mut usize, c: char) {
    let byte_pos = char_to_byte(s, *cursor);
    s.insert(byte_pos, c);
    *cursor += 1;
}

/// Backspace: 删除光标前的字符
pub fn str_delete_back(s: &mut String, cursor: &mut usize) {
    if *cursor > 0 {
        *cursor -= 1;
        let byte_pos = char_to_byte(s, *cursor);
        let next_byte_pos = char_to_byte(s, *cursor + 1);
        s.drain(byte_pos..next_byte_pos);
    }
}

/// Delete: 删除光标后的字符
pub fn str_delete_forward(s: &mut String, cursor: &mut usize) {
    let char_count = s.chars().count();
    if *cursor < char_count {
        let byte_pos = char_to_byte(s, *cursor);
        let next_byte_pos = char_to_byte(s, *cursor + 1);
        s.drain(byte_pos..next_byte_pos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_delete_multibyte() {
        let mut s = String::from("工具");
        let mut cursor = 1;
        str_insert_char(&mut s, &mut cursor, '作');
        assert_eq!(s, "工作具");
        assert_eq!(cursor, 2);

        str_delete_back(&mut s, &mut cursor);
        assert_eq!(s, "工具");
        assert_eq!(cursor, 1);

        str_delete_forward(&mut s, &mut cursor);
        assert_eq!(s, "工");
        assert_eq!(cursor, 1);
    }

    #[test]
    fn delete_at_boundaries_is_noop() {
        let mut s = String::from("a");
        let mut cursor = 0;
        str_delete_back(&mut s, &mut cursor);
        assert_eq!(s, "a");
        cursor = 1;
        str_delete_forward(&mut s, &mut cursor);
        assert_eq!(s, "a");
    }
}
