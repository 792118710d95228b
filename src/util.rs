use glam::Mat4;

/// Multi-line dump of a matrix, one column per line, for trace logs.
pub fn format_mat4(name: &str, mat: &Mat4) -> String {
    let mut output = format!("{}:\n", name);
    for (label, col) in ["x_axis", "y_axis", "z_axis", "w_axis"]
        .iter()
        .zip(mat.to_cols_array_2d())
    {
        output.push_str(&format!(
            "{}: [{:8.3},{:8.3},{:8.3},{:8.3}]\n",
            label, col[0], col[1], col[2], col[3]
        ));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn one_line_per_column() {
        let text = format_mat4("model", &Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "model:");
        assert_eq!(lines[4], "w_axis: [   1.000,   2.000,   3.000,   1.000]");
    }
}
