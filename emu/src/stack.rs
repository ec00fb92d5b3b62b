//! Initial user-mode stack construction.

use crate::machine::Machine;
use crate::registers::SP;

impl Machine {
    /// Create a machine whose memory ends in an initialized user-mode
    /// stack.
    ///
    /// The stack grows toward small addresses. Memory is extended beyond
    /// `mem_size` by the space the stack itself needs, so that SP sits at
    /// `mem_size`... once everything below is in place the layout reading
    /// upward from the final SP is:
    ///
    /// ```text
    ///   argc
    ///   argv[0] .. argv[argc-1] pointers
    ///   0
    ///   envp[0] .. envp[n-1] pointers
    ///   0
    ///   (padding to 8 bytes)
    ///   argv and env string payloads, NUL-terminated
    /// ```
    pub fn with_stack(entry: u64, mem_size: u64, argv: &[String], env: &[String]) -> Machine {
        let mut size = mem_size;
        for e in env {
            size += e.len() as u64 + 1;
        }
        for a in argv {
            size += a.len() as u64 + 1;
        }
        size += (1 + env.len() as u64 + 1 + argv.len() as u64 + 1) * 8;

        let mut m = Machine::new(entry, size);
        m.regs[SP] = size;

        // Record each string's start address as it is pushed; the zeros
        // recorded between the groups become the table terminators.
        let mut addrs = vec![0u64];
        for e in env.iter().rev() {
            m.push_cstring(e);
            addrs.push(m.regs[SP]);
        }
        addrs.push(0);
        for a in argv.iter().rev() {
            m.push_cstring(a);
            addrs.push(m.regs[SP]);
        }
        m.regs[SP] &= !0x7; // align the stack to 8 bytes
        for &a in &addrs {
            m.push_u64(a);
        }
        m.push_u64(argv.len() as u64);
        m
    }

    fn push_u64(&mut self, v: u64) {
        self.regs[SP] -= 8;
        let sp = self.regs[SP];
        self.write_u64(sp, v);
    }

    fn push_cstring(&mut self, s: &str) {
        let bytes = s.as_bytes();
        self.regs[SP] -= bytes.len() as u64 + 1; // +1 for the NUL
        let sp = self.regs[SP] as usize;
        self.mem[sp..sp + bytes.len()].copy_from_slice(bytes);
        self.mem[sp + bytes.len()] = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cstring_at(m: &Machine, addr: u64) -> String {
        let mut end = addr as usize;
        while m.mem[end] != 0 {
            end += 1;
        }
        String::from_utf8(m.mem[addr as usize..end].to_vec()).unwrap()
    }

    #[test]
    fn test_stack_layout() {
        let argv = vec!["prog".to_string(), "hello".to_string(), "world".to_string()];
        let env = vec!["A=B".to_string(), "LANG=C".to_string()];
        let m = Machine::with_stack(0x100, 0x1000, &argv, &env);

        let sp = m.regs[SP];
        assert_eq!(sp % 8, 0);

        // argc
        assert_eq!(m.read_u64(sp), 3);

        // argv pointers in order, NULL terminated
        for (i, want) in argv.iter().enumerate() {
            let p = m.read_u64(sp + 8 + 8 * i as u64);
            assert_ne!(p, 0);
            assert_eq!(&cstring_at(&m, p), want, "argv[{i}]");
        }
        assert_eq!(m.read_u64(sp + 8 + 8 * argv.len() as u64), 0);

        // envp pointers follow, NULL terminated
        let envp = sp + 8 + 8 * (argv.len() as u64 + 1);
        for (i, want) in env.iter().enumerate() {
            let p = m.read_u64(envp + 8 * i as u64);
            assert_ne!(p, 0);
            assert_eq!(&cstring_at(&m, p), want, "envp[{i}]");
        }
        assert_eq!(m.read_u64(envp + 8 * env.len() as u64), 0);
    }

    #[test]
    fn test_stack_strings_sit_above_pointers() {
        let argv = vec!["a".to_string()];
        let env: Vec<String> = vec![];
        let m = Machine::with_stack(0, 64, &argv, &env);

        let sp = m.regs[SP];
        let argv0 = m.read_u64(sp + 8);
        assert!(argv0 > sp);
        assert_eq!(cstring_at(&m, argv0), "a");
        // env table is just the terminator
        assert_eq!(m.read_u64(sp + 24), 0);
    }

    #[test]
    fn test_empty_vectors() {
        let m = Machine::with_stack(0, 64, &[], &[]);
        let sp = m.regs[SP];
        assert_eq!(m.read_u64(sp), 0); // argc
        assert_eq!(m.read_u64(sp + 8), 0); // argv terminator
        assert_eq!(m.read_u64(sp + 16), 0); // envp terminator
    }
}
